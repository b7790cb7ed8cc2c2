fn main() -> anyhow::Result<()> {
    structscope_cli::run()
}
