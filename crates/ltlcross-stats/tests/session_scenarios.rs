use std::fs;
use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use ltlcross_stats::{
    CompareOptions, Error, ExitStatus, Restrict, Session, SessionConfig, Tool,
};
use tempfile::TempDir;

const RESULTS: &str = "\
formula,tool,exit_status,exit_code,time,states,edges,transitions,acc,scc,nondetstates,nondeterministic,terminal_scc,weak_scc,strong_scc,ambiguous,complete,automaton
\"F(a)\",A,ok,0,0.01,3,5,6,1,2,0,0,1,1,0,0,0,
\"F(a)\",B,ok,0,0.02,4,4,8,1,2,1,1,1,1,0,1,0,
\"G(b)\",A,ok,0,0.01,5,9,9,1,1,0,0,1,0,0,0,0,
\"G(b)\",B,timeout,,,,,,,,,,,,,,,
\"a U b\",A,ok,0,0.01,2,3,3,1,2,0,0,1,1,0,0,0,
\"a U b\",B,signal,,,,,,,,,,,,,,,
\"X(c)\",A,exit code,2,,,,,,,,,,,,,,
\"X(c)\",B,ok,0,0.01,3,3,3,1,3,0,0,1,1,0,0,0,
";

const LOG: &str = "\
ltlcross '{A}a -f %f >%O' '{B}b -f %s >%O' -F f.ltl --csv=r.csv
[01.02.2024 09:00:00]
=====================
Running [P0]: a -f 'F(a)' >'lcr-o0-1'
Running [P1]: b -f 'F(a)' >'lcr-o1-1'

f.ltl:1: F(a)
Running [P0]: a -f 'F(a)' >'lcr-o0-1'
Performing sanity checks and gathering statistics...

f.ltl:2: G(b)
Running [P0]: a -f 'G(b)' >'lcr-o0-2'

f.ltl:3: G(a)
Running [P0]: a -f 'G(a)' >'lcr-o0-3'
error: P0*N1 is nonempty

f.ltl:4: a U b
Running [P0]: a -f 'a U b' >'lcr-o0-4'
error: P1*N0 is nonempty
error: P0*N1 is nonempty

";

fn tools() -> Vec<Tool> {
    vec![Tool::new("A", "a -f %f >%O"), Tool::new("B", "b -f %s >%O")]
}

fn setup(dir: &Path) -> Session {
    let res = dir.join("r.csv");
    fs::write(&res, RESULTS).unwrap();
    fs::write(dir.join("r.log"), LOG).unwrap();
    let mut s = Session::new(tools()).with_res_file(&res);
    s.parse_results().unwrap();
    s
}

#[test]
fn better_than_counts_failures_of_the_other_tool() {
    let tmp = TempDir::new().unwrap();
    let s = setup(tmp.path());

    let sel = s.better_than("A", "B", &["states"], &CompareOptions::default()).unwrap();
    let formulas: Vec<&str> = sel.rows.iter().map(|&id| s.form_of_id(id).unwrap()).collect();
    assert_eq!(formulas, vec!["Gb", "a U b", "Fa"]);

    let smaller = s.smaller_than("A", "B", "states", false, Restrict::PropertiesAndTools).unwrap();
    assert_eq!(smaller.rows, vec![0]);
    let reversed = s.smaller_than("A", "B", "states", true, Restrict::Full).unwrap();
    assert!(reversed.is_empty());
    assert_eq!(reversed.columns.len(), 6);
}

#[test]
fn error_counts_per_kind() {
    let tmp = TempDir::new().unwrap();
    let s = setup(tmp.path());
    let crash = s.get_error_count("crash").unwrap();
    assert_eq!(crash["A"], 1);
    assert_eq!(crash["B"], 1);
    assert_eq!(s.get_error_count("timeout").unwrap()["B"], 1);
    assert_eq!(s.get_error_count("parse error").unwrap()["A"], 0);
}

#[test]
fn incorrect_automata_leave_the_aggregates() {
    let tmp = TempDir::new().unwrap();
    let mut s = setup(tmp.path());
    assert_eq!(s.cummulative("states").unwrap()["A"], 3.0);

    s.mark_incorrect(0, "A").unwrap();
    s.na_incorrect().unwrap();
    let t = s.results().unwrap();
    assert_eq!(t.status("A", 0), Some(ExitStatus::Incorrect));
    assert_eq!(s.cummulative("states").unwrap()["A"], 0.0);
    assert_eq!(s.get_error_count("incorrect").unwrap()["A"], 1);
    // 誤りとされた自動機は比較にも現れない
    let sel = s.better_than("A", "B", &["states"], &CompareOptions::default()).unwrap();
    assert!(!sel.contains(0));
}

#[test]
fn log_blocks_become_bug_entries() {
    let tmp = TempDir::new().unwrap();
    let s = setup(tmp.path());
    let log = s.parse_check_log().unwrap();
    assert_eq!(log.tools.len(), 2);
    assert_eq!(log.tools["P1"], "b -f 'F(a)' >'lcr-o1-1'");
    assert_eq!(log.bugs.len(), 2);
    assert_eq!(log.bugs[&2], vec!["error: P0*N1 is nonempty".to_owned()]);
    assert_eq!(log.bugs[&3].len(), 2);
    assert_eq!(log.bogus_formulas[&2], "G(a)");
    assert!(!log.bugs.contains_key(&0));
}

#[test]
fn missing_inputs_are_reported() {
    let tmp = TempDir::new().unwrap();
    let mut s = Session::new(tools()).with_res_file(tmp.path().join("none.csv"));
    assert!(matches!(s.parse_results(), Err(Error::ResultsNotFound(_))));
    assert!(matches!(s.parse_check_log(), Err(Error::LogNotFound(_))));
}

#[test]
fn gzip_results_are_read_transparently() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("r.csv.gz");
    let mut enc = GzEncoder::new(fs::File::create(&path).unwrap(), Compression::default());
    enc.write_all(RESULTS.as_bytes()).unwrap();
    enc.finish().unwrap();

    let mut s = Session::new(tools());
    s.parse_results_from(&path).unwrap();
    assert_eq!(s.formula_count().unwrap(), 4);
    assert_eq!(s.id_of_form("X c").unwrap(), 3);
}

#[test]
fn session_from_config_file() {
    let tmp = TempDir::new().unwrap();
    let cfg_path = tmp.path().join("s.toml");
    fs::write(
        &cfg_path,
        "res_file = \"na.csv\"\ncols = [\"states\"]\n\n\
         [[tool]]\nname = \"B\"\ncommand = \"b\"\n\n[[tool]]\nname = \"A\"\ncommand = \"a\"\n",
    )
    .unwrap();
    let s = Session::from_config(SessionConfig::load(&cfg_path).unwrap());
    assert_eq!(s.tool_names(), vec!["B", "A"]);
    assert_eq!(s.log_file(), Path::new("na.log"));
    assert_eq!(s.cols(), ["states".to_owned()]);
}
