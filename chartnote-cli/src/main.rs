mod sheet;

use std::path::{Path, PathBuf};

use anyhow::Context;
use chartnote_core::{ClinicInfo, OrphanOrderPolicy, ParserConfig};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Bao trùm mọi target `chartnote_*`; `RUST_LOG` ghi đè.
const DEFAULT_LOG_FILTER: &str = "chartnote=info";

#[derive(Parser, Debug)]
#[command(
    name = "chartnote",
    about = "Tách phần ghi chú khám và trích xuất y lệnh từ phần Plan."
)]
struct Args {
    /// Số vòng giải mã HTML entity tối đa.
    #[arg(long, global = true, default_value_t = chartnote_core::DEFAULT_DECODE_PASSES)]
    max_decode_passes: u8,

    /// Cách xử lý y lệnh đứng trước chẩn đoán đầu tiên.
    #[arg(long, global = true, value_enum, default_value_t = OrphanArg::Drop)]
    orphan_orders: OrphanArg,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// In các phần của ghi chú dưới dạng JSON.
    Sections {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// In các phần và Plan có cấu trúc.
    Parse {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Phân tích một đoạn Plan dạng dàn ý.
    Plan {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Gộp y lệnh thật với y lệnh suy ra từ ghi chú.
    Orders {
        /// File JSON danh sách lần khám (`visit_id`, `note_text`).
        #[arg(long)]
        visits: PathBuf,
        /// File JSON danh sách y lệnh thật.
        #[arg(long)]
        real: Option<PathBuf>,
        /// Chỉ in y lệnh của lần khám này.
        #[arg(long)]
        visit: Option<String>,
    },
    /// Loại y lệnh ảo trùng với y lệnh thật trong một danh sách hỗn hợp.
    Dedupe {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// In phiếu y lệnh dạng văn bản, nhóm theo lần khám.
    Print {
        #[arg(long)]
        visits: PathBuf,
        #[arg(long)]
        real: Option<PathBuf>,
        /// File JSON thông tin phòng khám.
        #[arg(long)]
        clinic: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OrphanArg {
    Drop,
    GeneralBucket,
}

impl From<OrphanArg> for OrphanOrderPolicy {
    fn from(arg: OrphanArg) -> Self {
        match arg {
            OrphanArg::Drop => OrphanOrderPolicy::Drop,
            OrphanArg::GeneralBucket => OrphanOrderPolicy::GeneralBucket,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = ParserConfig {
        max_decode_passes: args.max_decode_passes,
        orphan_orders: args.orphan_orders.into(),
    };

    match args.command {
        Command::Sections { input } => {
            let note = read_text(&input)?;
            print_json(&chartnote_parser::parse_note_sections_with(&note, &config))
        }
        Command::Parse { input } => {
            let note = read_text(&input)?;
            print_json(&chartnote_parser::parse_note(&note, &config))
        }
        Command::Plan { input } => {
            let plan = read_text(&input)?;
            print_json(&chartnote_parser::parse_plan_outline_with(&plan, &config))
        }
        Command::Orders {
            visits,
            real,
            visit,
        } => {
            let list = load_orders(&visits, real.as_deref(), &config)?;
            match visit {
                Some(visit_id) => print_json(&list.for_visit(&visit_id).collect::<Vec<_>>()),
                None => print_json(&list),
            }
        }
        Command::Dedupe { input } => {
            let kept = chartnote_parser::dedupe_orders_str(&read_text(&input)?)
                .with_context(|| format!("Không loại trùng được y lệnh trong {input:?}"))?;
            print_json(&kept)
        }
        Command::Print {
            visits,
            real,
            clinic,
        } => {
            let list = load_orders(&visits, real.as_deref(), &config)?;
            let clinic: ClinicInfo = match clinic {
                Some(path) => serde_json::from_str(&read_text(&path)?)
                    .with_context(|| format!("Không đọc được thông tin phòng khám {path:?}"))?,
                None => ClinicInfo::default(),
            };
            print!("{}", sheet::render_order_sheet(&clinic, &list));
            Ok(())
        }
    }
}

fn load_orders(
    visits: &Path,
    real: Option<&Path>,
    config: &ParserConfig,
) -> anyhow::Result<chartnote_core::ConsolidatedOrderList> {
    let visits_json = read_text(visits)?;
    let real_json = match real {
        Some(path) => read_text(path)?,
        None => "null".to_string(),
    };
    let list = chartnote_parser::consolidate_orders_str(&real_json, &visits_json, config)
        .with_context(|| format!("Không gộp được y lệnh từ {visits:?}"))?;
    tracing::info!(orders = list.len(), "consolidated order list");
    Ok(list)
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Không đọc được file {path:?}"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_filter_parses() {
        assert_eq!(DEFAULT_LOG_FILTER, "chartnote=info");
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn dedupe_subcommand_takes_input_file() {
        let args = Args::try_parse_from(["chartnote", "dedupe", "--input", "orders.json"])
            .expect("args");
        assert!(matches!(args.command, Command::Dedupe { .. }));
        assert_eq!(args.max_decode_passes, chartnote_core::DEFAULT_DECODE_PASSES);
    }
}
