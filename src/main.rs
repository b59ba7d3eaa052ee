use std::{path::PathBuf, time::Duration};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use gallery_client::{
    api::http,
    cache::QueryCache,
    config::Config,
    feed::{FeedLoader, FetchOutcome, Pages},
    form::{SelectedFile, SubmitError, UploadForm},
    viewer::ImageViewer,
};
use indicatif::ProgressBar;
use tracing::{error, info};

#[derive(Parser)]
struct Opts {
    #[clap(short, long, env = "GALLERY_CONFIG")]
    config: PathBuf,
    /// Overrides `image_host.api_key` from the config file.
    #[clap(long, env = "GALLERY_IMAGE_HOST_KEY", hide_env_values = true)]
    image_host_key: Option<String>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the image feed.
    Feed {
        #[clap(long, default_value_t = 1)]
        pages: usize,
    },
    /// Upload an image and register it in the gallery.
    Upload {
        #[clap(long)]
        file: PathBuf,
        #[clap(long)]
        title: String,
        #[clap(long)]
        description: String,
    },
    /// Show a single image.
    View {
        #[clap(long)]
        url: url::Url,
    },
}

fn spinner(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

async fn feed(api: &http::Client, pages: usize) -> anyhow::Result<()> {
    let mut cache = QueryCache::<Pages>::new();
    let mut loader = FeedLoader::default();

    let bar = spinner("Carregando...");
    let result = loader.read(api, &mut cache).await.map(|_| ());
    bar.finish_and_clear();
    result.with_context(|| format!("load {}", api.endpoint()))?;

    for _ in 1..pages {
        let bar = spinner("Carregando...");
        let outcome = loader.load_next_page(api, &mut cache).await;
        bar.finish_and_clear();
        if outcome.with_context(|| "load next page")? == FetchOutcome::Exhausted {
            break;
        }
    }

    let view = loader.view(&cache);
    for record in view.items() {
        println!(
            "{}\t{}\t{}\t{}",
            record.created_at.to_rfc3339(),
            record.title,
            record.description,
            record.url
        );
    }
    if let Some(label) = view.load_more_label() {
        info!(loaded = view.len(), "{label}");
    }
    Ok(())
}

async fn upload(
    api: &http::Client,
    host: &http::HostClient,
    file: PathBuf,
    title: String,
    description: String,
) -> anyhow::Result<()> {
    let mut cache = QueryCache::<Pages>::new();
    let mut form = UploadForm::new();
    let draft = form.open();
    draft.set_title(title);
    draft.set_description(description);

    let file = SelectedFile::open(&file).await?;
    let bar = spinner("Enviando imagem...");
    let selected = form.select_file(host, file).await;
    bar.finish_and_clear();
    if let Err(e) = selected {
        error!(%e, "image selection failed");
    }

    match form.submit(api, &mut cache).await {
        Ok(notification) => {
            println!("{notification}");
            if notification.is_success() {
                Ok(())
            } else {
                Err(anyhow!("{}", notification.title))
            }
        }
        Err(SubmitError::Invalid(errors)) => {
            for (field, message) in errors.iter() {
                eprintln!("{field}: {message}");
            }
            Err(anyhow!("invalid form"))
        }
        Err(e) => Err(e.into()),
    }
}

fn view(url: url::Url) {
    let mut viewer = ImageViewer::new();
    viewer.open(url);
    if let (Some(image), Some(link)) = (viewer.image_url(), viewer.original_link()) {
        println!("{image}");
        println!("{}: {}", link.label, link.href);
    }
    viewer.close();
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let mut config = Config::load(&opts.config).await?;
    if let Some(key) = opts.image_host_key {
        config.image_host.api_key = key;
    }
    config.validate().map_err(|msg| anyhow!("{msg}"))?;

    let api = http::Client::new(&config.api.base_url)?;
    match opts.command {
        Command::Feed { pages } => feed(&api, pages).await,
        Command::Upload {
            file,
            title,
            description,
        } => {
            let host = http::HostClient::new(
                config.image_host.endpoint.clone(),
                config.image_host.api_key.clone(),
            );
            upload(&api, &host, file, title, description).await
        }
        Command::View { url } => {
            view(url);
            Ok(())
        }
    }
}

fn main() {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(?e, "failed to start runtime");
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(run(opts)) {
        error!(?e, "critical error");
        std::process::exit(1);
    }
}
