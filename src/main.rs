mod appstore;
mod error;
mod feed;
mod fetch;
mod model;
mod parser;
mod report;
mod settings;
mod tree;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use appstore::{Catalog, Platform};
use feed::Feed;
use fetch::Fetcher;
use parser::sections::StopAt;
use settings::Settings;
use tree::Format;

#[derive(Parser)]
#[command(name = "mofa_feeds", about = "Microsoft Office for Mac release feeds")]
struct Cli {
    /// Directory the feed files are written to (overrides config)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Security updates per release from the release-notes page
    CveHistory,
    /// Download links per release from the update-history page
    UpdateHistory,
    /// App Store metadata for every catalog entry of one platform
    Appstore {
        #[arg(short, long, value_enum)]
        platform: Platform,
    },
    /// Render the README from the standalone and App Store feeds
    Readme,
    /// Every feed, then the README
    All,
    /// Re-encode a feed file
    Convert {
        input: PathBuf,
        #[arg(long, value_enum)]
        to: Format,
        /// Output path (default: input with the new extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load().context("loading settings")?;
    if let Some(dir) = cli.output_dir {
        settings.output_dir = dir;
    }

    let result = match cli.command {
        Commands::CveHistory => cve_history(&settings),
        Commands::UpdateHistory => update_history(&settings),
        Commands::Appstore { platform } => appstore(&settings, platform),
        Commands::Readme => readme(&settings),
        Commands::All => all(&settings),
        Commands::Convert { input, to, output } => convert(&input, to, output),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        info!("Done in {}", format_duration(elapsed));
    }

    result
}

fn cve_history(settings: &Settings) -> anyhow::Result<()> {
    let stop = StopAt(settings.stop_at()?);
    let fetcher = Fetcher::new(settings)?;
    let html = fetcher
        .get_text(&settings.release_notes_url)
        .context("fetching release notes")?;

    let sections = parser::parse_release_notes(&html, &settings.content_selector, &settings.group_marker, &stop)
        .context("parsing release notes")?;
    let tree = Feed::new(sections).to_tree(&feed::CVE_HISTORY);
    feed::write_all(&tree, &feed::CVE_HISTORY, &settings.output_dir).context("writing CVE history")?;
    Ok(())
}

fn update_history(settings: &Settings) -> anyhow::Result<()> {
    let fetcher = Fetcher::new(settings)?;
    let html = fetcher
        .get_text(&settings.update_history_url)
        .context("fetching update history")?;

    let releases = parser::parse_update_history(&html).context("parsing update history")?;
    let tree = Feed::new(releases).to_tree(&feed::UPDATE_HISTORY);
    feed::write_all(&tree, &feed::UPDATE_HISTORY, &settings.output_dir)
        .context("writing update history")?;
    Ok(())
}

fn appstore(settings: &Settings, platform: Platform) -> anyhow::Result<()> {
    let catalog = Catalog::builtin().context("loading app catalog")?;
    let fetcher = Fetcher::new(settings)?;
    let entries = catalog.entries(platform);
    info!("Looking up {} {:?} apps", entries.len(), platform);

    let records = appstore::lookup_all(entries, &fetcher);
    let layout = platform.layout();
    let tree = Feed::new(records).to_tree(layout);
    feed::write_all(&tree, layout, &settings.output_dir)
        .with_context(|| format!("writing {} feed", layout.stem))?;
    Ok(())
}

fn readme(settings: &Settings) -> anyhow::Result<()> {
    let load = |path: PathBuf, layout: &feed::Layout| {
        report::FeedIndex::load(&path, layout).with_context(|| format!("reading {}", path.display()))
    };
    let feed_xml = |layout: &feed::Layout| settings.output_dir.join(format!("{}.xml", layout.stem));

    let sources = report::Sources {
        standalone: load(settings.standalone_feed_path(), &feed::STANDALONE)?,
        ios: load(feed_xml(&feed::IOS_APPSTORE), &feed::IOS_APPSTORE)?,
        macos: load(feed_xml(&feed::MACOS_APPSTORE), &feed::MACOS_APPSTORE)?,
    };

    let content = report::render_readme(&sources, &feed::timestamp());
    feed::write_atomic(&settings.readme_path, &content)
        .with_context(|| format!("writing {}", settings.readme_path.display()))?;
    info!("README updated at {}", settings.readme_path.display());
    Ok(())
}

fn all(settings: &Settings) -> anyhow::Result<()> {
    let steps: [(&str, &dyn Fn() -> anyhow::Result<()>); 5] = [
        ("cve-history", &|| cve_history(settings)),
        ("update-history", &|| update_history(settings)),
        ("appstore ios", &|| appstore(settings, Platform::Ios)),
        ("appstore macos", &|| appstore(settings, Platform::Macos)),
        ("readme", &|| readme(settings)),
    ];

    let mut failed = Vec::new();
    for (name, step) in steps {
        let t = Instant::now();
        info!("Running {}", name);
        match step() {
            Ok(()) => info!("{} finished in {}", name, format_duration(t.elapsed())),
            Err(e) => {
                error!("{} failed: {:#}", name, e);
                failed.push(name);
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} of {} steps failed: {}", failed.len(), steps.len(), failed.join(", "))
    }
}

fn convert(input: &Path, to: Format, output: Option<PathBuf>) -> anyhow::Result<()> {
    let output = output.unwrap_or_else(|| input.with_extension(to.extension()));
    let contents = feed::convert(input, to).with_context(|| format!("converting {}", input.display()))?;
    feed::write_atomic(&output, &contents).with_context(|| format!("writing {}", output.display()))?;
    info!("Converted {} -> {}", input.display(), output.display());
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
