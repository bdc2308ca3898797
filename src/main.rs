use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use collection_vault::analysis::{AnalysisClient, CollectionCategory};
use collection_vault::catalog::filter::{categories_of, tags_of};
use collection_vault::catalog::{
    DraftId, ItemFilter, ItemId, Library, NewItem, SortBy, SortOrder, UserId,
};
use collection_vault::import::collect_images;
use collection_vault::pipeline::Uploader;
use collection_vault::processing::{ImageResizer, ThumbnailGenerator};
use collection_vault::storage::LocalObjectStore;
use collection_vault::{AppConfig, Collection};

#[derive(Debug, Parser)]
#[command(name = "collection-vault", version, about = "Catalog a hobby collection with photos")]
struct Cli {
    /// Configuration file (defaults to <config dir>/collection-vault/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// User whose collection is used
    #[arg(long, global = true, env = "COLLECTION_VAULT_USER", default_value = "local")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a draft and print its identifier
    Draft,

    /// Upload image files or folders to a draft or a saved item
    Upload {
        #[arg(long, conflicts_with = "item", required_unless_present = "item")]
        draft: Option<String>,
        #[arg(long)]
        item: Option<String>,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Save a new item, moving the draft's images into it
    Add {
        #[arg(long)]
        draft: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        sub_category: Option<String>,
        #[arg(long)]
        manufacturer: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Fill in missing details by analyzing this photo
        #[arg(long)]
        auto_fill: Option<PathBuf>,
    },

    /// List items
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long, value_enum, default_value_t = SortArg::Created)]
        sort: SortArg,
        #[arg(long)]
        asc: bool,
    },

    /// Show or edit an item's images
    Gallery {
        #[arg(long)]
        item: String,
        /// URL to add (repeatable)
        #[arg(long)]
        add: Vec<String>,
        /// URL to remove; its object is deleted (repeatable)
        #[arg(long)]
        remove: Vec<String>,
    },

    /// Analyze a photo and print the detected details
    Analyze {
        image: PathBuf,
        #[arg(long, default_value = "general")]
        category: String,
    },

    /// Delete an item and all of its images
    Delete {
        #[arg(long)]
        item: String,
    },

    /// List categories, creating the defaults on first use
    Categories {
        /// Add a category with this name
        #[arg(long)]
        add: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Name,
    Created,
    Year,
}

impl From<SortArg> for SortBy {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => SortBy::Name,
            SortArg::Created => SortBy::CreatedAt,
            SortArg::Year => SortBy::YearReleased,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let user = UserId::parse(&cli.user)?;
    let collection = open_collection(&config)?;

    match cli.command {
        Command::Draft => {
            println!("{}", collection.begin_draft(&user));
        }

        Command::Upload { draft, item, paths } => {
            let scan = collect_images(paths).await;
            if scan.files.is_empty() {
                bail!("No images found");
            }

            let results = match (draft, item) {
                (Some(draft), _) => {
                    let draft = DraftId::parse(&draft)?;
                    collection.upload_to_draft(&user, &draft, &scan.files).await?
                }
                (None, Some(item)) => {
                    let item = ItemId::parse(&item)?;
                    collection.upload_to_item(&user, &item, &scan.files).await?.uploads
                }
                (None, None) => bail!("Pass --draft or --item"),
            };

            for (file, result) in scan.files.iter().zip(&results) {
                match result {
                    Ok(uploaded) => println!("{}\t{}", file.name, uploaded.asset.url),
                    Err(err) => println!("{}\tFAILED: {err}", file.name),
                }
            }
            if scan.skipped > 0 {
                println!("Skipped {} non-image file(s)", scan.skipped);
            }
        }

        Command::Add {
            draft,
            name,
            category,
            sub_category,
            manufacturer,
            year,
            tags,
            notes,
            auto_fill,
        } => {
            let draft = DraftId::parse(&draft)?;
            let mut new = NewItem {
                tags,
                ..NewItem::default()
            };

            if let Some(photo) = auto_fill {
                let scan = collect_images(vec![photo]).await;
                let file = scan.files.first().context("Auto-fill photo is not an image")?;
                let hint = category
                    .as_deref()
                    .and_then(CollectionCategory::parse)
                    .unwrap_or_default();
                let result = collection.auto_fill(file, hint).await?;
                let applied = result.apply_to(&mut new, collection.thresholds());
                info!(applied, overall = result.confidence.overall, "Auto-fill applied");
            }

            // Explicit arguments win over detected values
            if let Some(name) = name {
                new.name = name;
            }
            if let Some(category) = category {
                new.category = category;
            }
            new.sub_category = sub_category.or(new.sub_category);
            new.manufacturer = manufacturer.or(new.manufacturer);
            new.year_released = year.or(new.year_released);
            new.notes = notes.or(new.notes);
            if new.name.trim().is_empty() || new.category.trim().is_empty() {
                bail!("An item needs a name and a category (pass --name/--category or --auto-fill)");
            }

            let created = collection.create_item(&user, &draft, new).await?;
            println!("{}", created.item.id);
            for url in &created.item.image_urls {
                println!("  {url}");
            }
            if let Some(err) = created.migration_error {
                eprintln!("Warning: {err}. The item is saved; re-upload missing images with `upload --item`.");
            }
        }

        Command::List {
            search,
            category,
            tags,
            sort,
            asc,
        } => {
            let items = collection.library().list_items(&user)?;
            let filter = ItemFilter {
                search,
                category,
                tags,
                sort_by: sort.into(),
                order: if asc { SortOrder::Asc } else { SortOrder::Desc },
            };

            let shown = filter.apply(&items);
            for item in &shown {
                println!(
                    "{}\t{}\t{}\t{}\t{} image(s)",
                    item.id,
                    item.name,
                    item.category,
                    item.year_released.map(|y| y.to_string()).unwrap_or_default(),
                    item.image_urls.len()
                );
            }
            println!(
                "{} of {} item(s); categories: {}; tags: {}",
                shown.len(),
                items.len(),
                categories_of(&items).join(", "),
                tags_of(&items).join(", ")
            );
        }

        Command::Gallery { item, add, remove } => {
            let item = ItemId::parse(&item)?;
            let mut gallery = collection.open_gallery(&user, &item)?;

            if !add.is_empty() || !remove.is_empty() {
                for url in &remove {
                    gallery.mark_for_deletion(url);
                }
                for url in add {
                    gallery.select(collection.store(), url)?;
                }
                let report = collection.commit_gallery(&mut gallery).await?;
                for (url, err) in &report.failed {
                    eprintln!("Could not delete {url}: {err}");
                }
            }

            for url in gallery.current_urls() {
                println!("{url}");
            }
        }

        Command::Analyze { image, category } => {
            let category = CollectionCategory::parse(&category)
                .with_context(|| format!("Unknown category `{category}`"))?;
            let scan = collect_images(vec![image]).await;
            let file = scan.files.first().context("Not an image")?;

            let result = collection.auto_fill(file, category).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::Delete { item } => {
            let item = ItemId::parse(&item)?;
            let removed = collection.delete_item(&user, &item).await?;
            println!("Deleted {item} ({removed} object(s))");
        }

        Command::Categories { add } => {
            let library = collection.library();
            library.seed_default_categories(&user)?;
            if let Some(name) = add {
                library.add_category(&user, collection_vault::catalog::NewCategory::new(name))?;
            }
            for category in library.list_categories(&user)? {
                println!("{}\t{}", category.name, category.sub_categories.join(", "));
            }
        }
    }

    Ok(())
}

fn open_collection(config: &AppConfig) -> Result<Collection> {
    let root = config
        .storage
        .root
        .clone()
        .or_else(LocalObjectStore::default_root)
        .context("No data directory found; set storage.root")?;
    let mut store = LocalObjectStore::open(&root)
        .with_context(|| format!("Failed to open object store at {}", root.display()))?;
    if let Some(base) = &config.storage.public_base_url {
        store = store.with_public_base_url(base.clone());
    }
    let store = Arc::new(store);

    let db_path = config
        .catalog
        .database
        .clone()
        .or_else(Library::default_db_path)
        .context("No data directory found; set catalog.database")?;
    let library = Arc::new(
        Library::open(&db_path)
            .with_context(|| format!("Failed to open catalog at {}", db_path.display()))?,
    );

    let processing = &config.processing;
    let uploader = Uploader::new(
        store.clone(),
        ImageResizer::new(processing.options()).with_quality(processing.jpeg_quality),
        ThumbnailGenerator::new(processing.thumbnail_size).with_quality(processing.jpeg_quality),
    )
    .with_retry(config.upload.retry_policy())
    .with_put_timeout(config.upload.put_timeout());

    let mut collection =
        Collection::new(store, library, uploader).with_max_images(config.gallery.max_images);
    if config.analysis.is_configured() {
        collection = collection.with_analysis(
            AnalysisClient::new(&config.analysis)?,
            config.analysis.thresholds,
        );
    }

    info!(root = %root.display(), catalog = %db_path.display(), "Collection opened");
    Ok(collection)
}
