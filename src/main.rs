fn main() -> anyhow::Result<()> {
    breakwise_lib::run()
}
