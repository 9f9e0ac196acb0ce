use hierarchy_store::config::AppConfig;
use hierarchy_store::run_demo;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    println!("Hierarchy store: instance hierarchy builder");

    let config = AppConfig::load()?;
    println!(
        "Configuration loaded: backend={:?} reader_batch_size={} writer_batch_size={} max_workers={}",
        config.backend,
        config.batch.reader_batch_size,
        config.batch.writer_batch_size,
        config.batch.max_workers
    );

    println!(
        "Building hierarchy for instance {} dimension {} from code list {}...",
        config.demo.instance_id, config.demo.dimension_name, config.demo.code_list_id
    );
    let (report, root) = run_demo(&config).await?;

    println!("Build finished: {}", serde_json::to_string(&report)?);
    println!("{}", serde_json::to_string_pretty(&root)?);

    Ok(())
}
