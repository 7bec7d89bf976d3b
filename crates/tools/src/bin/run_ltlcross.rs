/// 設定ファイルから ltlcross を実行するツール
///
/// 使い方:
///   # 設定ファイルの全ツールで実行
///   run_ltlcross na_comp.toml
///
///   # 一部のツールのみ、タイムアウト 60 秒
///   run_ltlcross na_comp.toml --tools Spot,LTL3BA --timeout 60
///
///   # 実行せずにコマンドラインだけ表示
///   run_ltlcross na_comp.toml --dry-run
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ltlcross_stats::{RunOptions, Session, SessionConfig};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(about = "Run ltlcross for the tools of a session config")]
struct Cli {
    /// セッション設定 (TOML)
    config: PathBuf,

    /// Per-translation timeout in seconds (0 disables it)
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    /// Run ltlcross's cross-checks
    #[arg(long)]
    check: bool,

    /// Do not store automata in the CSV
    #[arg(long)]
    no_automata: bool,

    /// Do not save bogus formulas
    #[arg(long)]
    no_save_bogus: bool,

    /// Comma separated subset of tool names
    #[arg(long, value_delimiter = ',')]
    tools: Option<Vec<String>>,

    /// ltlcross executable
    #[arg(long, default_value = "ltlcross")]
    ltlcross: String,

    /// Override the results CSV path
    #[arg(long)]
    res_file: Option<PathBuf>,

    /// Override the log path
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the command line and exit
    #[arg(long)]
    dry_run: bool,
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

    let opts = RunOptions {
        automata: !cli.no_automata,
        check: cli.check,
        timeout: (cli.timeout > 0).then_some(cli.timeout),
        save_bogus: !cli.no_save_bogus,
        ltlcross: cli.ltlcross,
        tool_subset: cli.tools,
        res_file: cli.res_file,
        log_file: cli.log_file,
        ..Default::default()
    };

    if cli.dry_run {
        println!("{}", session.ltlcross_cmd(&opts)?);
        return Ok(());
    }

    let code = session.run_ltlcross(&opts).context("failed to run ltlcross")?;
    if code != 0 {
        // ltlcross の終了コードをそのまま返す (シグナル終了は 1)
        std::process::exit(if code > 0 { code } else { 1 });
    }
    Ok(())
}
