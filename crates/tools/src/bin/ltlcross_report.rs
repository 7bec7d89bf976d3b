/// ltlcross の結果集計ツール
///
/// 使い方:
///   # 設定ファイルの results/log を集計
///   ltlcross_report na_comp.toml
///
///   # 2 ツールの比較 (states, edges の順に辞書式比較)
///   ltlcross_report na_comp.toml --compare Spot,LTL3BA --props states,edges
///
///   # 誤った自動機を記録して集計から除外
///   ltlcross_report na_comp.toml --mark-incorrect 3:LTL3BA --na-incorrect
///
///   # JSON出力モード
///   ltlcross_report --json na_comp.toml
use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use ltlcross_stats::{
    CheckLog, CompareOptions, CrossMatrix, Error as StatsError, ErrorKind, Restrict, Session,
    SessionConfig,
};
use serde::Serialize;

const BEST_COLUMN: &str = "Minimum";

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(about = "ltlcross の結果集計")]
struct Cli {
    /// セッション設定 (TOML)
    config: PathBuf,

    /// Results CSV to read instead of the configured one
    #[arg(long)]
    results: Option<PathBuf>,

    /// Log to read instead of the configured one
    #[arg(long)]
    log: Option<PathBuf>,

    /// 比較に使う統計列（省略時は設定の cols 全部）
    #[arg(long, value_delimiter = ',')]
    props: Option<Vec<String>>,

    /// Add a virtual tool holding the per-formula minimum of all tools
    #[arg(long)]
    best: bool,

    /// Mark `<ID>:<TOOL>` as incorrect in the results file (repeatable)
    #[arg(long = "mark-incorrect", value_name = "ID:TOOL")]
    mark_incorrect: Vec<String>,

    /// Treat automata marked incorrect as missing
    #[arg(long)]
    na_incorrect: bool,

    /// List formulas on which the first of two tools beats the second
    #[arg(long, value_delimiter = ',', num_args = 1, value_name = "T1,T2")]
    compare: Option<Vec<String>>,

    /// Count failures of the second tool as wins of the first
    #[arg(long)]
    include_fails: bool,

    /// --compare の表示に全統計列を含める
    #[arg(long)]
    all_stats: bool,

    /// --compare の表示に全ツールを含める
    #[arg(long)]
    all_tools: bool,

    /// JSON出力モード
    #[arg(long)]
    json: bool,
}

// ---------------------------------------------------------------------------
// 出力用の構造体
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct JsonBetter {
    better: String,
    worse: String,
    props: Vec<String>,
    formulas: Vec<JsonFormulaRow>,
}

#[derive(Serialize)]
struct JsonFormulaRow {
    id: usize,
    formula: String,
    values: BTreeMap<String, Option<f64>>,
}

#[derive(Serialize)]
struct JsonBug {
    id: usize,
    formula: String,
    messages: Vec<String>,
}

#[derive(Serialize)]
struct JsonOutput {
    formulas: usize,
    tools: Vec<String>,
    errors: BTreeMap<String, BTreeMap<String, usize>>,
    cumulative: BTreeMap<String, BTreeMap<String, f64>>,
    cross: CrossMatrix,
    better_than: Option<JsonBetter>,
    bugs: Option<Vec<JsonBug>>,
}

struct Report {
    formulas: usize,
    tools: Vec<String>,
    errors: BTreeMap<String, BTreeMap<String, usize>>,
    cumulative: BTreeMap<String, BTreeMap<String, f64>>,
    cross: CrossMatrix,
    better_than: Option<JsonBetter>,
    log: Option<CheckLog>,
}

// ---------------------------------------------------------------------------
// 集計
// ---------------------------------------------------------------------------

fn parse_mark(arg: &str) -> Result<(usize, String)> {
    let Some((id, tool)) = arg.split_once(':') else {
        bail!("--mark-incorrect expects ID:TOOL, got `{arg}`");
    };
    let id = id.trim().parse().with_context(|| format!("bad formula id in `{arg}`"))?;
    Ok((id, tool.trim().to_owned()))
}

fn build_report(cli: &Cli, session: &mut Session) -> Result<Report> {
    match &cli.results {
        Some(path) => session.parse_results_from(path)?,
        None => session.parse_results()?,
    }

    for arg in &cli.mark_incorrect {
        let (id, tool) = parse_mark(arg)?;
        match &cli.results {
            Some(path) => session.mark_incorrect_in(id, &tool, path, path)?,
            None => session.mark_incorrect(id, &tool)?,
        }
        log::info!("marked formula {id} of {tool} as incorrect");
    }
    if cli.na_incorrect {
        session.na_incorrect()?;
    }

    let tools = session.results().map(|t| t.tools().to_vec()).unwrap_or_default();
    let mut errors = BTreeMap::new();
    for kind in ErrorKind::ALL {
        errors.insert(kind.to_string(), session.error_count(kind)?);
    }

    if cli.best {
        session.compute_best(None, BEST_COLUMN)?;
    }

    let props: Vec<String> = cli.props.clone().unwrap_or_else(|| session.cols().to_vec());
    let mut cumulative = BTreeMap::new();
    for stat in session.cols() {
        cumulative.insert(stat.clone(), session.cummulative(stat)?);
    }

    let mut cross_tools = session.tool_names();
    cross_tools.extend(session.mins().iter().cloned());
    cross_tools.dedup();
    let cross = session.cross_compare(Some(cross_tools.as_slice()), &props, cli.include_fails)?;

    let better_than = match cli.compare.as_deref() {
        None => None,
        Some([t1, t2]) => {
            let opts = CompareOptions {
                include_fails: cli.include_fails,
                reverse: false,
                restrict: Restrict::from_flags(!cli.all_stats, !cli.all_tools),
            };
            let sel = session.better_than(t1, t2, &props, &opts)?;
            let table = session.results().context("results disappeared")?;
            let formulas = sel
                .rows
                .iter()
                .zip(sel.values(table))
                .map(|(&id, values)| JsonFormulaRow {
                    id,
                    formula: table.formula(id).unwrap_or_default().to_owned(),
                    values: sel
                        .columns
                        .iter()
                        .map(|k| format!("{}/{}", k.stat, k.tool))
                        .zip(values)
                        .collect(),
                })
                .collect();
            Some(JsonBetter {
                better: t1.clone(),
                worse: t2.clone(),
                props: props.clone(),
                formulas,
            })
        }
        Some(_) => bail!("--compare expects exactly two tools"),
    };

    let log = {
        let parsed = match &cli.log {
            Some(path) => ltlcross_stats::parse_check_log(path),
            None => session.parse_check_log(),
        };
        match parsed {
            Ok(log) => Some(log),
            Err(StatsError::LogNotFound(path)) => {
                log::warn!("log not found, skipping bug report: {}", path.display());
                None
            }
            Err(e) => return Err(e.into()),
        }
    };

    Ok(Report {
        formulas: session.formula_count()?,
        tools,
        errors,
        cumulative,
        cross,
        better_than,
        log,
    })
}

// ---------------------------------------------------------------------------
// メイン処理
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let cfg = SessionConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let mut session = Session::from_config(cfg);
    if let Some(log) = &cli.log {
        session = session.with_log_file(log);
    }

    let report = build_report(&cli, &mut session)?;
    if cli.json {
        print_json(report)?;
    } else {
        print_text(&report);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// テキスト出力
// ---------------------------------------------------------------------------

fn print_text(report: &Report) {
    println!("式の数: {}  ツール: {}", report.formulas, report.tools.join(", "));
    println!();

    println!("エラー件数（ツール別）");
    println!("{}", "=".repeat(75));
    print!("  {:12}", "");
    for tool in &report.tools {
        print!(" {tool:>12}");
    }
    println!();
    for (kind, counts) in &report.errors {
        print!("  {kind:12}");
        for tool in &report.tools {
            print!(" {:>12}", counts.get(tool).copied().unwrap_or(0));
        }
        println!();
    }

    println!();
    println!("累計（全ツールが値を持つ式のみ）");
    println!("{}", "=".repeat(75));
    for (stat, sums) in &report.cumulative {
        let cells: Vec<String> = sums.iter().map(|(tool, v)| format!("{tool}:{v}")).collect();
        println!("  {stat:12} | {}", cells.join("  "));
    }

    println!();
    println!("勝数表（行が列より良い式の数）");
    println!("{}", "=".repeat(75));
    print!("  {:12}", "");
    for tool in &report.cross.tools {
        print!(" {tool:>12}");
    }
    println!();
    for (tool, row) in report.cross.tools.iter().zip(&report.cross.counts) {
        print!("  {tool:12}");
        for n in row {
            print!(" {n:>12}");
        }
        println!();
    }

    if let Some(better) = &report.better_than {
        println!();
        println!(
            "{} が {} より良い式 ({}): {}件",
            better.better,
            better.worse,
            better.props.join(" > "),
            better.formulas.len()
        );
        println!("{}", "=".repeat(75));
        for row in &better.formulas {
            let cells: Vec<String> = row
                .values
                .iter()
                .map(|(col, v)| match v {
                    Some(v) => format!("{col}={v}"),
                    None => format!("{col}=-"),
                })
                .collect();
            println!("  {:4} {:30} | {}", row.id, row.formula, cells.join(" "));
        }
    }

    if let Some(log) = &report.log {
        println!();
        println!("クロスチェックで見つかった不具合: {}件", log.bugs.len());
        println!("{}", "=".repeat(75));
        for (id, messages) in &log.bugs {
            let formula = log.bogus_formulas.get(id).map_or("", String::as_str);
            println!("  {id:4} {formula}");
            for m in messages {
                println!("       {m}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// JSON出力
// ---------------------------------------------------------------------------

fn print_json(report: Report) -> Result<()> {
    let bugs = report.log.map(|log| {
        log.bugs
            .into_iter()
            .map(|(id, messages)| JsonBug {
                id,
                formula: log.bogus_formulas.get(&id).cloned().unwrap_or_default(),
                messages,
            })
            .collect()
    });
    let output = JsonOutput {
        formulas: report.formulas,
        tools: report.tools,
        errors: report.errors,
        cumulative: report.cumulative,
        cross: report.cross,
        better_than: report.better_than,
        bugs,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
