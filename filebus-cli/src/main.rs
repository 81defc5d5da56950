mod config;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use config::Settings;
use filebus_core::{
    transfer, Broker, BrokerClient, DownloadTarget, Identity, RedisBus, S3Store,
};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "filebus")]
#[command(about = "File transfer between peers and S3 over a shared message bus")]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Bus connection url, e.g. rediss://bus.example.com:6379
    #[arg(long, global = true)]
    bus_url: Option<String>,

    /// Bus channel name shared by broker and clients
    #[arg(long, global = true)]
    bus_channel: Option<String>,

    /// Skip the encrypted-transport check on the bus connection
    #[arg(long, global = true)]
    trust_key: bool,

    /// Seconds to wait for a broker reply; 0 waits forever
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Persistent file broker, handling interfacing with S3
    Broker {
        #[arg(long)]
        s3_bucket: Option<String>,
        #[arg(long)]
        s3_region: Option<String>,
    },
    /// Retrieve a file to stdout
    Get {
        /// Fetch the most recently uploaded file instead of naming one
        #[arg(long)]
        latest: bool,
        filename: Option<String>,
    },
    /// Upload a file
    Put { filename: String },
    /// List stored files, most recent first
    List {
        #[arg(short, long, default_value_t = 10)]
        count: usize,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filebus=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(error) => {
            tracing::error!("Failed to load config: {}", error);
            std::process::exit(1);
        }
    };

    if let Some(url) = cli.bus_url.clone() {
        settings.bus_url = url;
    }
    if let Some(channel) = cli.bus_channel.clone() {
        settings.bus_channel = channel;
    }
    if cli.trust_key {
        settings.trust_key = true;
    }
    if let Some(secs) = cli.timeout_secs {
        settings.timeout_secs = secs;
    }

    if let Err(error) = run(cli.command, settings).await {
        tracing::error!("{:#}", error);
        std::process::exit(1);
    }
}

async fn run(command: Commands, settings: Settings) -> anyhow::Result<()> {
    match command {
        Commands::Broker {
            s3_bucket,
            s3_region,
        } => run_broker(settings, s3_bucket, s3_region).await,
        Commands::Get { latest, filename } => run_get(settings, latest, filename).await,
        Commands::Put { filename } => run_put(settings, filename).await,
        Commands::List { count } => run_list(settings, count).await,
    }
}

async fn connect(settings: &Settings, role: &str) -> anyhow::Result<impl filebus_core::BusChannel> {
    let identity = Identity::generate(role);
    RedisBus::connect(
        &settings.bus_url,
        &settings.bus_channel,
        identity,
        settings.trust_key,
    )
    .await
    .context("unable to connect to the bus")
}

async fn run_broker(
    settings: Settings,
    s3_bucket: Option<String>,
    s3_region: Option<String>,
) -> anyhow::Result<()> {
    let Some(bucket) = s3_bucket.or(settings.s3.bucket.clone()) else {
        bail!("an S3 bucket is required: pass --s3-bucket or set FILEBUS_S3__BUCKET");
    };
    let region = s3_region
        .or(settings.s3.region.clone())
        .unwrap_or_else(|| "us-east-1".to_string());

    let store = S3Store::new(&bucket, &region).context("unable to build the S3 client")?;
    tracing::info!("brokering bucket '{}' in region '{}'", bucket, region);

    let mut conn = connect(&settings, "file-broker").await?;
    Broker::new(Arc::new(store))
        .run(&mut conn)
        .await
        .context("broker loop failed")?;
    Ok(())
}

async fn run_get(
    settings: Settings,
    latest: bool,
    filename: Option<String>,
) -> anyhow::Result<()> {
    let target = if latest {
        DownloadTarget::Latest
    } else {
        match filename.as_deref() {
            Some(name) => DownloadTarget::Named(name),
            None => bail!("a filename is required unless --latest is given"),
        }
    };

    let mut conn = connect(&settings, "file-get").await?;
    let grant = BrokerClient::new(&mut conn, settings.timeout())
        .request_download(target)
        .await
        .context("no download grant received")?;

    tracing::info!("downloading '{}'", grant.filename);
    let mut stdout = tokio::io::stdout();
    let written = transfer::download(&grant.signed, &mut stdout)
        .await
        .context("download failed")?;
    tracing::info!("wrote {} bytes", written);
    Ok(())
}

async fn run_put(settings: Settings, filename: String) -> anyhow::Result<()> {
    let path = std::path::Path::new(&filename);
    if !path.is_file() {
        bail!("'{}' is not a readable file", filename);
    }

    let mut conn = connect(&settings, "file-put").await?;
    let mut client = BrokerClient::new(&mut conn, settings.timeout());
    let signed = client
        .request_upload(&filename)
        .await
        .context("no upload grant received")?;

    tracing::info!("uploading '{}'", filename);
    let sent = transfer::upload(&signed, path)
        .await
        .context("upload failed")?;
    tracing::info!("sent {} bytes", sent);

    client.announce_upload().await?;
    Ok(())
}

async fn run_list(settings: Settings, count: usize) -> anyhow::Result<()> {
    let mut conn = connect(&settings, "file-list").await?;
    let files = BrokerClient::new(&mut conn, settings.timeout())
        .request_list(count)
        .await
        .context("no listing received")?;

    for (index, file) in files.iter().enumerate() {
        println!(
            "{}: {} (size: {}, uploaded: {})",
            index, file.name, file.size, file.modified
        );
    }
    Ok(())
}
