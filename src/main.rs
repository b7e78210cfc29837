use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::error;

use aitrace::browse::{ImageBrowser, Tab};
use aitrace::client::{ApiClient, UploadOptions};
use aitrace::config::Config;
use aitrace::import::{coerce_label_value, BulkImporter, ColumnMapping, CsvTable};
use aitrace::logging;
use aitrace::session::Session;
use aitrace::types::{
    Dataset, ImageUpdateRequest, ImportImageRequest, LabelDefinition, LabelType, LabelUpdate,
    LabelValue, Page, UpdateDatasetRequest, UserCreateRequest,
};

#[derive(Parser)]
#[command(name = "aitrace")]
#[command(about = "Client for the aitrace image dataset labeling service")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the access token
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Discard the stored access token
    Logout,
    /// Manage datasets
    Datasets {
        #[command(subcommand)]
        command: DatasetCommands,
    },
    /// Browse and edit dataset images
    Images {
        #[command(subcommand)]
        command: ImageCommands,
    },
    /// Bulk-import images from a CSV file
    Import {
        /// Dataset id to import into
        #[arg(long)]
        dataset: String,
        /// CSV file with a header row
        file: PathBuf,
        /// Column holding image URLs (default: guessed from headers)
        #[arg(long)]
        url_column: Option<String>,
        /// Column holding image names (default: guessed from headers)
        #[arg(long)]
        name_column: Option<String>,
        /// Label-to-column mapping, label=column (repeatable)
        #[arg(long = "map", value_parser = parse_key_val)]
        maps: Vec<(String, String)>,
    },
    /// Export a dataset to a local file
    Export {
        #[arg(long)]
        dataset: String,
        /// Export only labeled images
        #[arg(long)]
        only_labeled: bool,
        #[arg(long, default_value = "csv")]
        format: String,
        #[arg(long)]
        output: PathBuf,
    },
    /// List test runs recorded against a dataset
    Tests {
        #[arg(long)]
        dataset: String,
    },
    /// Manage users (admin only)
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Manage feature flags (admin only)
    Flags {
        #[command(subcommand)]
        command: FlagCommands,
    },
    /// Manage developer API keys
    Keys {
        #[command(subcommand)]
        command: KeyCommands,
    },
}

#[derive(Subcommand)]
enum DatasetCommands {
    /// List all datasets
    List,
    /// Create a dataset
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Show one dataset with its label schema
    Show { id: String },
    /// Update a dataset's name or description
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Add a label definition to a dataset's schema
    AddLabel {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long = "type", value_enum, default_value_t = LabelTypeArg::Boolean)]
        label_type: LabelTypeArg,
        #[arg(long)]
        description: Option<String>,
        /// Possible value for a category label (repeatable)
        #[arg(long = "value")]
        values: Vec<String>,
    },
    /// Remove a label definition from a dataset's schema
    RemoveLabel {
        id: String,
        #[arg(long)]
        name: String,
    },
    /// Delete a dataset
    Delete { id: String },
    /// List the predefined schema templates
    Schemas,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LabelTypeArg {
    Boolean,
    Category,
}

impl From<LabelTypeArg> for LabelType {
    fn from(arg: LabelTypeArg) -> Self {
        match arg {
            LabelTypeArg::Boolean => LabelType::Boolean,
            LabelTypeArg::Category => LabelType::Category,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TabArg {
    All,
    Labeled,
    Queued,
}

impl From<TabArg> for Tab {
    fn from(arg: TabArg) -> Self {
        match arg {
            TabArg::All => Tab::All,
            TabArg::Labeled => Tab::Labeled,
            TabArg::Queued => Tab::Queued,
        }
    }
}

#[derive(Subcommand)]
enum ImageCommands {
    /// List one page of images for a tab
    List {
        #[arg(long)]
        dataset: String,
        #[arg(long, value_enum, default_value_t = TabArg::All)]
        tab: TabArg,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        page_size: Option<u32>,
    },
    /// Show one image with its labels
    Show {
        #[arg(long)]
        dataset: String,
        image: String,
    },
    /// Upload a single image by file or by URL
    Upload {
        #[arg(long)]
        dataset: String,
        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        name: Option<String>,
        /// Label assignment, label=value (repeatable)
        #[arg(long = "label", value_parser = parse_key_val)]
        labels: Vec<(String, String)>,
    },
    /// Save labels, comment and name for an image
    Save {
        #[arg(long)]
        dataset: String,
        image: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        comment: Option<String>,
        /// Label assignment, label=value (repeatable)
        #[arg(long = "label", value_parser = parse_key_val)]
        labels: Vec<(String, String)>,
    },
    /// Delete an image
    Delete {
        #[arg(long)]
        dataset: String,
        image: String,
    },
    /// Move an image back to the labeling queue
    Queue {
        #[arg(long)]
        dataset: String,
        image: String,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    List,
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// Roles for the new user (repeatable)
        #[arg(long = "role", default_values_t = vec!["user".to_string()])]
        roles: Vec<String>,
    },
    SetPassword {
        id: String,
        #[arg(long)]
        password: String,
    },
    Delete { id: String },
}

#[derive(Subcommand)]
enum FlagCommands {
    List,
    Set {
        name: String,
        #[arg(long, action = ArgAction::Set)]
        enabled: bool,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    List,
    Create,
    Revoke { id: String },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

/// Coerce `label=value` CLI pairs against the dataset's schema, the same
/// way the CSV importer coerces cells.
fn coerce_cli_labels(
    dataset: &Dataset,
    pairs: &[(String, String)],
) -> anyhow::Result<Vec<LabelUpdate>> {
    let definitions = dataset.label_map();
    let mut updates = Vec::new();
    for (name, raw) in pairs {
        let definition = definitions
            .get(name)
            .with_context(|| format!("dataset has no label named '{name}'"))?;
        updates.push(LabelUpdate {
            name: name.clone(),
            value: coerce_label_value(raw, definition),
        });
    }
    Ok(updates)
}

fn print_dataset(dataset: &Dataset) {
    println!(
        "{}  {}  ({} images, {} labeled, {} queued)",
        dataset.id, dataset.name, dataset.n_images, dataset.n_labeled_images,
        dataset.n_queued_images
    );
}

fn format_label_value(value: &LabelValue) -> String {
    match value {
        LabelValue::Bool(b) => b.to_string(),
        LabelValue::Text(s) => s.clone(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;
    let session = Session::from_env()?;
    let mut client = ApiClient::new(&config, session)?;

    match cli.command {
        Commands::Login { username, password } => {
            client.login(&username, &password).await?;
            println!("✅ Logged in as {username}");
        }
        Commands::Logout => {
            client.logout()?;
            println!("Logged out");
        }
        Commands::Datasets { command } => run_datasets(&client, command).await?,
        Commands::Images { command } => run_images(&client, &config, command).await?,
        Commands::Import {
            dataset,
            file,
            url_column,
            name_column,
            maps,
        } => {
            let table = CsvTable::read(&file)?;
            let dataset = client.get_dataset(&dataset).await?;
            let mut mapping =
                ColumnMapping::infer(&table.headers, dataset.labels.as_deref().unwrap_or(&[]));
            mapping.override_url_column(url_column);
            mapping.override_name_column(name_column);
            for (label, column) in &maps {
                mapping.override_label(label, column);
            }

            let url_column = mapping
                .url_column
                .clone()
                .context("no image URL column found; pass --url-column")?;
            println!(
                "🔄 Importing {} rows into '{}' (URL column: {})",
                table.rows.len(),
                dataset.name,
                url_column
            );

            let importer = BulkImporter::new(&dataset, mapping);
            let report = importer
                .run(&client, &table, |p| {
                    println!("   {} of {} ({}%)", p.processed, p.total, p.percent);
                })
                .await;

            println!("\n📊 Import results:");
            println!("   Imported: {}", report.success);
            println!("   Duplicates skipped: {}", report.conflicts);
            println!("   Failed: {}", report.failed);
            if report.success == 0 {
                error!("no images were imported");
            }
        }
        Commands::Export {
            dataset,
            only_labeled,
            format,
            output,
        } => {
            let bytes = client
                .export_dataset(&dataset, only_labeled, &format, &output)
                .await?;
            println!("✅ Exported {bytes} bytes to {}", output.display());
        }
        Commands::Tests { dataset } => {
            let runs = client.test_runs(&dataset).await?;
            if runs.is_empty() {
                println!("No test runs recorded");
            }
            for run in runs {
                println!(
                    "{}  {:?}  cases={}  precision={}  recall={}",
                    run.id,
                    run.status,
                    run.n_test_cases,
                    run.precision.map_or("-".into(), |v| format!("{v:.3}")),
                    run.recall.map_or("-".into(), |v| format!("{v:.3}")),
                );
            }
        }
        Commands::Users { command } => run_users(&client, command).await?,
        Commands::Flags { command } => run_flags(&client, command).await?,
        Commands::Keys { command } => run_keys(&client, command).await?,
    }

    Ok(())
}

async fn run_datasets(client: &ApiClient, command: DatasetCommands) -> anyhow::Result<()> {
    match command {
        DatasetCommands::List => {
            for dataset in client.list_datasets().await? {
                print_dataset(&dataset);
            }
        }
        DatasetCommands::Create { name, description } => {
            let dataset = client.create_dataset(&name, &description).await?;
            println!("✅ Created dataset {}", dataset.id);
        }
        DatasetCommands::Show { id } => {
            let dataset = client.get_dataset(&id).await?;
            print_dataset(&dataset);
            for definition in dataset.labels.iter().flatten() {
                println!(
                    "   label {} ({:?}) {}",
                    definition.name,
                    definition.label_type,
                    definition.possible_values.join("|")
                );
            }
        }
        DatasetCommands::Update { id, name, description } => {
            let current = client.get_dataset(&id).await?;
            let body = UpdateDatasetRequest {
                name: name.unwrap_or_else(|| current.name.clone()),
                description: description.unwrap_or_else(|| current.description.clone()),
                labels: current.labels.clone().unwrap_or_default(),
            };
            let updated = client.update_dataset(&id, &body).await?;
            println!("✅ Updated dataset {}", updated.id);
        }
        DatasetCommands::AddLabel { id, name, label_type, description, values } => {
            let mut dataset = client.get_dataset(&id).await?;
            dataset.add_label(LabelDefinition {
                name: name.clone(),
                label_type: label_type.into(),
                description: description.unwrap_or_default(),
                possible_values: values,
            })?;
            let body = UpdateDatasetRequest {
                name: dataset.name.clone(),
                description: dataset.description.clone(),
                labels: dataset.labels.clone().unwrap_or_default(),
            };
            let updated = client.update_dataset(&id, &body).await?;
            println!("✅ Added label {name} to dataset {}", updated.id);
        }
        DatasetCommands::RemoveLabel { id, name } => {
            let mut dataset = client.get_dataset(&id).await?;
            dataset.remove_label(&name)?;
            let body = UpdateDatasetRequest {
                name: dataset.name.clone(),
                description: dataset.description.clone(),
                labels: dataset.labels.clone().unwrap_or_default(),
            };
            let updated = client.update_dataset(&id, &body).await?;
            println!("🗑️  Removed label {name} from dataset {}", updated.id);
        }
        DatasetCommands::Delete { id } => {
            client.delete_dataset(&id).await?;
            println!("🗑️  Deleted dataset {id}");
        }
        DatasetCommands::Schemas => {
            for schema in client.dataset_schemas().await? {
                println!("{}  {}", schema.name, schema.description);
            }
        }
    }
    Ok(())
}

async fn run_images(
    client: &ApiClient,
    config: &Config,
    command: ImageCommands,
) -> anyhow::Result<()> {
    match command {
        ImageCommands::List {
            dataset,
            tab,
            search,
            page,
            page_size,
        } => {
            let dataset = client.get_dataset(&dataset).await?;
            let mut browser =
                ImageBrowser::new(&dataset, page_size.unwrap_or(config.browse.page_size));
            browser.set_tab(tab.into());
            if let Some(search) = &search {
                browser.set_search(search);
            }
            // set_page clamps against known totals, so fetch page one first
            // when jumping straight to a later page
            if page > 1 {
                let probe = client.list_images(&dataset.id, &browser.query()).await?;
                browser.apply_page(probe);
                browser.set_page(page);
            }
            let fetched = client.list_images(&dataset.id, &browser.query()).await?;
            browser.apply_page(fetched);

            for image in browser.images() {
                let state = if image.is_labeled { "labeled" } else { "queued" };
                let labels: Vec<String> = image
                    .label_values()
                    .iter()
                    .map(|(name, value)| format!("{name}={}", format_label_value(value)))
                    .collect();
                println!("{}  {}  [{}]  {}", image.id, image.name, state, labels.join(" "));
            }
            let pagination = browser.pagination();
            println!(
                "Page {} of {} ({} items)",
                pagination.current_page, pagination.total_pages, pagination.total_items
            );
        }
        ImageCommands::Show { dataset, image } => {
            let image = client.get_image(&dataset, &image).await?;
            println!("{}", serde_json::to_string_pretty(&image)?);
            println!("render: {}", client.render_url(&image.dataset_id, &image.id));
        }
        ImageCommands::Upload {
            dataset,
            file,
            url,
            name,
            labels,
        } => {
            let dataset = client.get_dataset(&dataset).await?;
            let updates = coerce_cli_labels(&dataset, &labels)?;
            let is_labeled = !updates.is_empty();

            let uploaded = match (file, url) {
                (Some(path), url) => {
                    let options = UploadOptions {
                        url,
                        name,
                        labels: updates,
                        is_labeled,
                    };
                    client.upload_image_by_file(&dataset.id, &path, &options).await?
                }
                (None, Some(url)) => {
                    let request = ImportImageRequest {
                        url,
                        name,
                        description: None,
                        labels: Some(updates),
                        is_labeled: Some(is_labeled),
                    };
                    client.upload_image_by_url(&dataset.id, &request).await?
                }
                (None, None) => bail!("pass --file or --url"),
            };
            println!("✅ Uploaded image {}", uploaded.id);
        }
        ImageCommands::Save {
            dataset,
            image,
            name,
            comment,
            labels,
        } => {
            let dataset = client.get_dataset(&dataset).await?;
            let current = client.get_image(&dataset.id, &image).await?;
            let updates = coerce_cli_labels(&dataset, &labels)?;

            let mut browser = ImageBrowser::new(&dataset, config.browse.page_size);
            browser.apply_page(Page {
                items: vec![current],
                total_items: 1,
                page_size: config.browse.page_size,
                current_page: 1,
                total_pages: 1,
            });
            if let Some(name) = &name {
                browser.set_name(&image, name);
            }
            if let Some(comment) = &comment {
                browser.set_comment(&image, comment);
            }
            for update in updates {
                browser.set_label(&image, &update.name, update.value);
            }

            let request = browser
                .save_request(&image)
                .context("image not found in browser state")?;
            let saved = client.update_image(&dataset.id, &image, &request).await?;
            browser.mark_saved(saved);
            println!("✅ Saved image {image}");
        }
        ImageCommands::Delete { dataset, image } => {
            client.delete_image(&dataset, &image).await?;
            println!("🗑️  Deleted image {image}");
        }
        ImageCommands::Queue { dataset, image } => {
            let request = ImageUpdateRequest {
                name: None,
                comment: None,
                labels: None,
                is_labeled: Some(false),
            };
            client.update_image(&dataset, &image, &request).await?;
            println!("↩️  Image {image} moved back to the queue");
        }
    }
    Ok(())
}

async fn run_users(client: &ApiClient, command: UserCommands) -> anyhow::Result<()> {
    match command {
        UserCommands::List => {
            for user in client.list_users().await? {
                println!("{}  {}  [{}]", user.id, user.username, user.roles.join(","));
            }
        }
        UserCommands::Create {
            username,
            password,
            roles,
        } => {
            let user = client
                .create_user(&UserCreateRequest {
                    username,
                    password,
                    roles,
                })
                .await?;
            println!("✅ Created user {} ({})", user.username, user.id);
        }
        UserCommands::SetPassword { id, password } => {
            client.update_user_password(&id, &password).await?;
            println!("✅ Password updated for user {id}");
        }
        UserCommands::Delete { id } => {
            client.delete_user(&id).await?;
            println!("🗑️  Deleted user {id}");
        }
    }
    Ok(())
}

async fn run_flags(client: &ApiClient, command: FlagCommands) -> anyhow::Result<()> {
    match command {
        FlagCommands::List => {
            for flag in client.feature_flags().await? {
                let state = if flag.enabled { "on" } else { "off" };
                println!(
                    "{}  [{}]  {}",
                    flag.name,
                    state,
                    flag.description.as_deref().unwrap_or("")
                );
            }
        }
        FlagCommands::Set { name, enabled } => {
            let flag = client.set_feature_flag(&name, enabled).await?;
            println!(
                "✅ Feature flag {} is now {}",
                flag.name,
                if flag.enabled { "on" } else { "off" }
            );
        }
    }
    Ok(())
}

async fn run_keys(client: &ApiClient, command: KeyCommands) -> anyhow::Result<()> {
    match command {
        KeyCommands::List => {
            for key in client.list_api_keys().await? {
                println!("{}  {}  created {}", key.id, key.api_key_preview, key.created_at);
            }
        }
        KeyCommands::Create => {
            let key = client.create_api_key().await?;
            println!("✅ Created API key {}", key.id);
            // Shown once; the backend only stores the preview
            println!("   {}", key.api_key);
        }
        KeyCommands::Revoke { id } => {
            client.revoke_api_key(&id).await?;
            println!("🗑️  Revoked API key {id}");
        }
    }
    Ok(())
}
