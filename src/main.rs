// Entry point and interactive menu.
//
// - Option [1] loads a sales export and builds the weekly report.
// - Option [2] prints the tables, then lets the user narrow the ABC table
//   to selected tiers.
// - After showing the tables, the user can go back to the menu or exit.
use once_cell::sync::Lazy;
use sku_weekly_report::config::ReportConfig;
use sku_weekly_report::error::Severity;
use sku_weekly_report::output;
use sku_weekly_report::types::{SalesReport, Tier};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CONFIG_FILE: &str = "report_config.json";
const DEFAULT_REPORT: &str = "vendas.xlsx";

// The last processed report, so tables can be shown repeatedly without
// re-reading the file.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState { report: None }));

struct AppState {
    report: Option<SalesReport>,
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}

fn prompt(label: &str) -> String {
    print!("{}", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn prompt_back_to_menu() -> bool {
    loop {
        match prompt("Back to Report Selection (Y/N): ").to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Option [1]: read the export and keep the finished report.
fn handle_load(config: &ReportConfig) {
    let input = prompt(&format!("Report file [{}]: ", DEFAULT_REPORT));
    let path = if input.is_empty() {
        PathBuf::from(DEFAULT_REPORT)
    } else {
        PathBuf::from(input)
    };

    match sku_weekly_report::run(&path, config) {
        Ok(report) => {
            println!("{}\n", output::success_message(&report.load));
            let mut state = APP_STATE.lock().unwrap_or_else(|e| e.into_inner());
            state.report = Some(report);
        }
        Err(e) => match e.severity() {
            Severity::Warning => println!("Warning: {}\n", e),
            Severity::Fatal => eprintln!("Error processing file: {}\n", e),
        },
    }
}

/// Parse a tier selection such as "A, B". Unknown entries are ignored.
fn parse_tiers(input: &str) -> Vec<Tier> {
    input
        .split([',', ' '])
        .filter_map(Tier::parse)
        .collect()
}

/// Option [2]: print all tables, then the ABC table filtered by tier.
fn handle_show_reports() {
    let report = {
        let state = APP_STATE.lock().unwrap_or_else(|e| e.into_inner());
        state.report.clone()
    };
    let Some(report) = report else {
        println!("Error: No report loaded. Please load a file first (option 1).\n");
        return;
    };

    output::print_report(&report);

    let selection = parse_tiers(&prompt("Filter ABC tiers (e.g. A,B; blank for all): "));
    if !selection.is_empty() {
        println!("\n{}\n", output::render_abc_table(&report.abc.filter(&selection)));
    }
}

fn main() {
    setup_logging();

    let config = match ReportConfig::load_or_default(Path::new(CONFIG_FILE)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load {}: {}", CONFIG_FILE, e);
            std::process::exit(1);
        }
    };

    loop {
        println!("Weekly Sales by SKU");
        println!("[1] Load the file");
        println!("[2] Show Reports\n");
        match prompt("Enter choice: ").as_str() {
            "1" => handle_load(&config),
            "2" => {
                println!();
                handle_show_reports();
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => println!("Invalid choice. Please enter 1 or 2.\n"),
        }
    }
}
