use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn};
use tracing_subscriber::EnvFilter;

use dataverse_semantic::metadata::{normalize_environment_url, MetadataAdapter, WebApiAdapter};
use dataverse_semantic::project::{ExtractSettings, DEFAULT_SETTINGS_FILE};
use dataverse_semantic::semantic::DateTableSpec;
use dataverse_semantic::{
    build_semantic_model, export_semantic_model, extract_dictionary, preview_solution,
    ExtractOptions, ModelOptions,
};

#[derive(Parser)]
#[command(name = "dataverse-semantic")]
#[command(author, version, about = "Dataverse metadata to semantic model definitions")]
struct Cli {
    /// Environment URL, e.g. https://yourorg.crm.dynamics.com
    #[arg(long, env = "DATAVERSE_URL", global = true)]
    url: Option<String>,

    /// Bearer token for the environment
    #[arg(long, env = "DATAVERSE_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Settings file remembering the last choices
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE, global = true)]
    settings: PathBuf,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List visible solutions
    Solutions,

    /// Show a solution's tables with their form and field counts
    Preview {
        /// Solution unique name (defaults to the last one used)
        #[arg(short, long)]
        solution: Option<String>,
    },

    /// Write the metadata dictionary for a solution
    Extract {
        #[arg(short, long)]
        solution: Option<String>,

        /// Output folder (defaults to the last one used, then the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Names the dictionary file (defaults to the solution)
        #[arg(long)]
        project_name: Option<String>,

        /// Logical names of the tables to describe (repeatable; defaults to the
        /// remembered selection, then all)
        #[arg(long = "table")]
        tables: Vec<String>,

        /// Describe only this main form of a table (repeatable)
        #[arg(long = "form", value_name = "TABLE=FORM_ID", value_parser = parse_choice)]
        forms: Vec<(String, String)>,

        /// Describe this view of a table instead of its default view (repeatable)
        #[arg(long = "view", value_name = "TABLE=VIEW_ID", value_parser = parse_choice)]
        views: Vec<(String, String)>,
    },

    /// Render the semantic model and export it as .tmdl files
    Export {
        #[arg(short, long)]
        solution: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Logical name of the fact table
        #[arg(long)]
        fact: Option<String>,

        /// Logical names of the tables to model (repeatable; default all)
        #[arg(long = "table")]
        tables: Vec<String>,

        /// Export only the fragment with this name
        #[arg(long)]
        only: Option<String>,

        /// Skip the calendar table
        #[arg(long)]
        no_date_table: bool,

        #[arg(long, default_value_t = 2015)]
        start_year: i32,

        #[arg(long, default_value_t = 2030)]
        end_year: i32,
    },
}

fn log_filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn,dataverse_semantic=info",
            1 => "info,dataverse_semantic=debug",
            _ => "debug",
        })
    })
}

fn parse_choice(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once('=') {
        Some((table, id)) if !table.trim().is_empty() && !id.trim().is_empty() => {
            Ok((table.trim().to_lowercase(), id.trim().to_string()))
        }
        _ => Err(format!("expected TABLE=ID, got '{}'", value)),
    }
}

fn pick(explicit: Option<String>, remembered: &str, what: &str) -> Result<String> {
    match explicit {
        Some(value) => Ok(value),
        None if !remembered.is_empty() => Ok(remembered.to_string()),
        None => bail!("No {} given and none remembered in settings", what),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_writer(std::io::stderr)
        .finish();
    let _log_guard = tracing::subscriber::set_default(subscriber);

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_ctrl_c.cancel();
        }
    });

    let mut settings = ExtractSettings::load(&cli.settings);
    let url = normalize_environment_url(&pick(
        cli.url.clone(),
        &settings.environment_url,
        "environment URL (--url or DATAVERSE_URL)",
    )?)?;
    let Some(token) = cli.token.as_deref() else {
        bail!("An access token is required (--token or DATAVERSE_TOKEN)");
    };
    let adapter = WebApiAdapter::connect(&url, token)?
        .with_span(info_span!("web_api", environment = %url));
    settings.environment_url = url.clone();

    match cli.command {
        Commands::Solutions => {
            for solution in adapter.list_solutions(&cancel).await? {
                println!(
                    "{:<40} {:<30} {:<12} {}",
                    solution.friendly_name,
                    solution.unique_name,
                    solution.version,
                    if solution.is_managed { "managed" } else { "unmanaged" }
                );
            }
        }
        Commands::Preview { solution } => {
            let solution = pick(solution, &settings.last_solution, "solution")?;
            let previews = preview_solution(&adapter, &solution, &cancel).await?;
            for preview in &previews {
                println!(
                    "{:<40} {:<30} forms={:<3} fields={}",
                    preview.table.display_name,
                    preview.table.logical_name,
                    preview.form_count,
                    preview.field_count
                );
            }
            println!("{} table(s)", previews.len());
            settings.last_solution = solution;
        }
        Commands::Extract {
            solution,
            output,
            project_name,
            tables,
            forms,
            views,
        } => {
            let solution = pick(solution, &settings.last_solution, "solution")?;
            let output_dir = output
                .or_else(|| settings.output_folder.clone())
                .unwrap_or_else(|| PathBuf::from("."));
            if !tables.is_empty() {
                settings.selected_tables = tables;
            }
            settings.table_forms.extend(forms);
            settings.table_views.extend(views);

            let options = ExtractOptions {
                solution: solution.clone(),
                output_dir: output_dir.clone(),
                project_name: project_name.or_else(|| settings.project_name.clone()),
                tables: settings.selected_tables.clone(),
                table_forms: settings.table_forms.clone(),
                table_views: settings.table_views.clone(),
                table_attributes: settings.table_attributes.clone(),
            };
            let (path, dictionary) = extract_dictionary(&adapter, &url, &options, &cancel).await?;
            println!(
                "Wrote {} ({} tables, {} fields)",
                path.display(),
                dictionary.tables.len(),
                dictionary.total_attributes()
            );
            settings.last_solution = solution;
            settings.output_folder = Some(output_dir);
            settings.project_name = options.project_name;
        }
        Commands::Export {
            solution,
            output,
            fact,
            tables,
            only,
            no_date_table,
            start_year,
            end_year,
        } => {
            let solution = pick(solution, &settings.last_solution, "solution")?;
            let remembered_fact = settings.fact_table.as_deref().unwrap_or("");
            let fact_table = pick(fact, remembered_fact, "fact table")?;
            let tables = if tables.is_empty() {
                settings.selected_tables.clone()
            } else {
                tables
            };
            let output_dir = output
                .or_else(|| settings.output_folder.clone())
                .unwrap_or_else(|| PathBuf::from("."));

            let options = ModelOptions {
                solution: solution.clone(),
                environment_url: url.clone(),
                fact_table: fact_table.clone(),
                tables: tables.clone(),
                date_table: (!no_date_table).then(|| DateTableSpec {
                    start_year,
                    end_year,
                    ..DateTableSpec::default()
                }),
                table_forms: settings.table_forms.clone(),
                table_attributes: settings.table_attributes.clone(),
            };
            let model = build_semantic_model(&adapter, &options, &cancel).await?;

            for fragment in model.sorted() {
                println!("[{}] {}", fragment.role.label(), fragment.name);
            }
            let paths = export_semantic_model(&model, &output_dir, only.as_deref())
                .with_context(|| format!("Exporting to {}", output_dir.display()))?;
            info!(files = paths.len(), dir = %output_dir.display(), "Export complete");
            println!("Exported {} file(s) to {}", paths.len(), output_dir.display());

            settings.last_solution = solution;
            settings.fact_table = Some(fact_table);
            settings.selected_tables = tables;
            settings.output_folder = Some(output_dir);
        }
    }

    settings.save(&cli.settings)?;
    Ok(())
}
