#[cfg(test)]
mod trace_regression_tests {
    use std::collections::HashMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use ndntrace::analysis::CorrelateError;
    use ndntrace::config::{load_config, FlowConfig};
    use ndntrace::orchestrator::{
        exit_code, run_trace, RunOptions, EXIT_DUPLICATE_SEND, EXIT_FAILURE, EXIT_UNCLASSIFIED_NAME,
    };

    const HEADER: &str = "nodeid, event, name, payloadsize, time\n";

    fn write_trace(dir: &Path, file_name: &str, rows: &str) -> PathBuf {
        let path = dir.join(file_name);
        fs::write(&path, format!("{}{}", HEADER, rows)).unwrap();
        path
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    /// Single WAC request/response produces the documented rows
    #[test]
    fn test_single_pair_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_trace(
            dir.path(),
            "trace.csv",
            "1, sent, /power/wac/a, 100, 0.000000000\n2, recv, /power/wac/a, 100, 0.050000000\n",
        );

        let report = run_trace(&FlowConfig::default(), &RunOptions::new(&input)).unwrap();
        assert_eq!(report.stats.matched_receives, 1);

        let lat = read_lines(&dir.path().join("lat_trace.csv"));
        assert_eq!(
            lat,
            vec![
                "srcid dstid timesent timerecv latency flowcls",
                "1 2 0.000000000 0.050000000 0.050000000 WAC",
            ]
        );

        let met = read_lines(&dir.path().join("met_trace.csv"));
        assert_eq!(
            met,
            vec![
                "flowcls recvcnt recvsize losscnt losssize",
                "WAC 1 100 0 0",
                "PDC 0 0 0 0",
                "PMU_TOT 0 0 0 0",
                "AMI_TOT 0 0 0 0",
            ]
        );
    }

    /// Delivered counts in the summary equal the latency rows per class
    #[test]
    fn test_summary_counts_match_latency_rows() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_trace(
            dir.path(),
            "mixed.csv",
            "1, sent, /power/wac/phy1/r1, 100, 0.0\n\
             2, recv, /power/wac/phy1/r1, 100, 0.01\n\
             3, recv, /power/wac/phy1/r1, 100, 0.02\n\
             4, sent, /power/pdc/phy4/r1, 60, 0.5\n\
             5, recv, /power/pdc/phy4/r1, 60, 0.55\n\
             5, recv, /power/pdc/phy4/none, 60, 0.6\n\
             6, sent, /power/pdc/phy6/r1, 60, 0.7\n",
        );

        let report = run_trace(&FlowConfig::default(), &RunOptions::new(&input)).unwrap();
        assert_eq!(report.stats.unmatched_receives, 1);

        let mut latency_counts: HashMap<String, u64> = HashMap::new();
        for line in read_lines(&dir.path().join("lat_mixed.csv")).iter().skip(1) {
            let class = line.split_whitespace().last().unwrap().to_string();
            *latency_counts.entry(class).or_default() += 1;
        }

        for line in read_lines(&dir.path().join("met_mixed.csv")).iter().skip(1) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let recv_count: u64 = fields[1].parse().unwrap();
            if fields[0].ends_with("_TOT") {
                continue;
            }
            assert_eq!(
                latency_counts.get(fields[0]).copied().unwrap_or(0),
                recv_count,
                "class {}",
                fields[0]
            );
        }

        let wac = report.summary.iter().find(|r| r.flow_class == "WAC").unwrap();
        assert_eq!(wac.counters.recv_count, 2);
        assert_eq!(wac.counters.recv_size, 200);
    }

    /// Unclassified names abort the run and leave no latency table
    #[test]
    fn test_unclassified_name_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_trace(
            dir.path(),
            "bad.csv",
            "1, sent, /power/wac/a, 100, 0.0\n1, sent, /power/bgd/a, 100, 0.1\n",
        );

        let err = run_trace(&FlowConfig::default(), &RunOptions::new(&input)).unwrap_err();
        assert_eq!(exit_code(&err), EXIT_UNCLASSIFIED_NAME);
        assert!(err
            .chain()
            .any(|c| matches!(c.downcast_ref::<CorrelateError>(), Some(CorrelateError::UnclassifiedName { line: 3, .. }))));
        assert!(!dir.path().join("lat_bad.csv").exists());
        assert!(!dir.path().join("met_bad.csv").exists());
    }

    #[test]
    fn test_duplicate_send_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_trace(
            dir.path(),
            "dupe.csv",
            "1, sent, /power/pdc/a, 10, 0.0\n1, sent, /power/pdc/a, 10, 0.1\n",
        );

        let err = run_trace(&FlowConfig::default(), &RunOptions::new(&input)).unwrap_err();
        assert_eq!(exit_code(&err), EXIT_DUPLICATE_SEND);
    }

    /// Loss detection feeds the group totals and synthetic loss rows
    #[test]
    fn test_full_catalogue_with_loss_detection() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/case39_full.yaml");
        let mut config = load_config(&config_path).unwrap();
        config.loss_timeout = Some(Duration::from_millis(100));

        let input = write_trace(
            dir.path(),
            "case39.csv",
            "1, sent, /direct/agg/pmu/phy1/0, 50, 0.000\n\
             10, recv, /direct/agg/pmu/phy1/0, 50, 0.010\n\
             10, sent, /direct/com/pmu/agg10/0, 80, 0.020\n\
             20, recv, /direct/com/pmu/agg10/0, 80, 0.030\n\
             10, sent, /direct/com/pmu/agg10/1, 80, 0.040\n\
             2, sent, /overlay/com/subscription/0, 12, 0.000\n\
             3, recv, /overlay/com/subscription/0, 12, 0.002\n",
        );

        let options = RunOptions {
            input: input.clone(),
            output_dir: Some(dir.path().join("out")),
            report: Some(dir.path().join("out/report.json")),
        };
        let report = run_trace(&config, &options).unwrap();
        assert_eq!(report.stats.end_to_end_records, 1);
        assert_eq!(report.stats.loss_records, 1);

        let met = read_lines(&dir.path().join("out/met_case39.csv"));
        assert!(met.contains(&"PMU_COM 1 80 1 80".to_string()));
        assert!(met.contains(&"PMU_TOT 1 80 1 80".to_string()));
        assert!(met.contains(&"DATA 1 12 0 0".to_string()));

        let lat = read_lines(&dir.path().join("out/lat_case39.csv"));
        assert!(lat.contains(&"PMU_TOT 0.020000".to_string()));
        assert_eq!(lat.last().unwrap(), "PMU_TOT 0.100000");

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("out/report.json")).unwrap()).unwrap();
        assert_eq!(json["metadata"]["loss_detection"], true);
        assert_eq!(json["stats"]["loss_records"], 1);
    }

    /// A summary that cannot be written takes the latency table with it
    #[test]
    fn test_summary_failure_removes_latency_log() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_trace(
            dir.path(),
            "blocked.csv",
            "1, sent, /power/wac/a, 100, 0.0\n2, recv, /power/wac/a, 100, 0.05\n",
        );
        fs::create_dir(dir.path().join("met_blocked.csv")).unwrap();

        let err = run_trace(&FlowConfig::default(), &RunOptions::new(&input)).unwrap_err();
        assert_eq!(exit_code(&err), EXIT_FAILURE);
        assert!(!dir.path().join("lat_blocked.csv").exists());
        assert!(dir.path().join("met_blocked.csv").is_dir());
    }

    #[test]
    fn test_missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_trace(
            &FlowConfig::default(),
            &RunOptions::new(dir.path().join("absent.csv")),
        );
        assert!(result.is_err());
    }
}
