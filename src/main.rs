use clap::Parser;
use guideme::archive::GuideArchive;
use guideme::browser::{ChromeDriver, ConnectionMode};
use guideme::config::{GuideConfig, Settings};
use guideme::controller::GuideController;
use guideme::dom::{Document, Element};
use guideme::guide::GuideMachine;
use guideme::host::{MemoryPage, PageHost};
use guideme::planner::{ClaudeCliPlanner, ScriptedPlanner, StepPlanner};
use guideme::recording::Recorder;
use guideme::storage::{FileStore, KeyValueStore, SessionPersistence};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 9669)]
    port: u16,

    /// Directory for sessions, recordings, the archive and settings
    #[arg(long, env = "GUIDEME_STORE_DIR")]
    store_dir: Option<PathBuf>,

    #[arg(long)]
    headless: bool,

    /// Linux AppArmor workaround
    #[arg(long)]
    no_sandbox: bool,

    #[arg(long)]
    chrome_path: Option<String>,

    /// Attach to a Chrome already running with --remote-debugging-port
    #[arg(long)]
    debug_port: Option<u16>,

    #[arg(long, env = "GUIDEME_CLAUDE_PATH")]
    claude_path: Option<String>,

    /// Claude model (e.g. "sonnet")
    #[arg(long)]
    model: Option<String>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Page to open at startup
    #[arg(long)]
    url: Option<String>,

    /// Serve an in-memory demo page with a scripted planner instead of Chrome
    #[arg(long)]
    offline: bool,
}

fn demo_page() -> Document {
    let mut doc = Document::new("https://demo.guideme.local/settings", "Account settings");
    let body = doc.body();
    let nav = doc.append(body, Element::new("nav").attr("aria-label", "Main").bounds(0.0, 0.0, 1280.0, 48.0));
    doc.append(
        nav,
        Element::new("a").attr("href", "/home").text("Home").bounds(16.0, 12.0, 60.0, 24.0),
    );
    let main = doc.append(body, Element::new("main").bounds(0.0, 48.0, 1280.0, 600.0));
    doc.append(main, Element::new("h1").text("Account settings").bounds(16.0, 64.0, 400.0, 32.0));
    doc.append(
        main,
        Element::new("input")
            .attr("type", "text")
            .attr("name", "display_name")
            .attr("placeholder", "Display name")
            .bounds(16.0, 120.0, 300.0, 32.0),
    );
    doc.append(
        main,
        Element::new("button")
            .attr("data-testid", "save-settings")
            .text("Save changes")
            .bounds(16.0, 170.0, 120.0, 36.0),
    );
    doc
}

fn offline_planner() -> ScriptedPlanner {
    let planner = ScriptedPlanner::new();
    planner.push_raw(
        r#"{"steps": [
            {"elementId": "gm-2", "action": "type", "value": "Ada", "description": "Type your new name into \"Display name\""},
            {"elementId": "gm-3", "action": "click", "description": "Click \"Save changes\""}
        ], "completed": true}"#,
    );
    planner
}

async fn launch_chrome(args: &Args, settings: &Settings) -> anyhow::Result<ChromeDriver> {
    let mode = match args.debug_port {
        Some(port) => ConnectionMode::DebugPort(port),
        None => ConnectionMode::Sandboxed {
            chrome_path: args.chrome_path.clone(),
            no_sandbox: args.no_sandbox,
            headless: args.headless,
        },
    };
    let driver = ChromeDriver::new(mode).await?.with_highlight_color(&settings.highlight_color);
    if let Some(url) = &args.url {
        driver.navigate(url).await?;
    }
    Ok(driver)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = GuideConfig::load_or_default(args.config.as_deref())?;
    let store_dir = args.store_dir.clone().unwrap_or_else(FileStore::default_dir);
    log::info!("Starting guideme on port {} (store: {})", args.port, store_dir.display());

    let durable: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(store_dir.join("shared")));
    let local = Arc::new(FileStore::new(store_dir.join("local")));

    // settings saved from the panel win over the config file
    match Settings::load(durable.as_ref()).await {
        Ok(stored) if stored != Settings::default() => config.settings = stored,
        Ok(_) => {}
        Err(e) => log::warn!("ignoring stored settings: {}", e),
    }

    let (host, planner): (Arc<dyn PageHost>, Arc<dyn StepPlanner>) = if args.offline {
        log::info!("offline mode: demo page with a scripted planner");
        (Arc::new(MemoryPage::new(demo_page())), Arc::new(offline_planner()))
    } else {
        let mut planner = ClaudeCliPlanner::new();
        if let Some(path) = args.claude_path.clone() {
            planner = planner.with_claude_path(path);
        }
        if let Some(model) = args.model.clone() {
            planner = planner.with_model(model);
        }
        let driver = launch_chrome(&args, &config.settings).await?;
        log::info!("Chrome ready");
        (Arc::new(driver), Arc::new(planner))
    };

    let machine = GuideMachine::new(
        host.clone(),
        planner,
        SessionPersistence::new(durable.clone(), local),
        GuideArchive::new(durable.clone()),
        config.clone(),
    );
    let recorder = Recorder::new(durable, Duration::from_millis(config.recording_debounce_ms));
    let controller = Arc::new(GuideController::new(host, machine, recorder));

    let watcher = controller.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(500));
        loop {
            ticker.tick().await;
            if let Err(e) = watcher.poll_url().await {
                log::debug!("url poll failed: {}", e);
            }
        }
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    match guideme::server::bind(controller, addr).await {
        Ok((bound, server)) => {
            log::info!("Listening on http://{}", bound);
            server.await;
            Ok(())
        }
        Err(e) => {
            log::error!("Failed to bind to port {}: {}", args.port, e);
            eprintln!("Error: Port {} is already in use or unavailable.", args.port);
            std::process::exit(1);
        }
    }
}
