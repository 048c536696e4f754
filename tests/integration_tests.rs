use ec_study::analyzers::report::build_report;
use ec_study::analyzers::types::SheetValue;
use ec_study::output::{export_environment_csv, export_growth_xlsx};
use ec_study::resolve::{nfc, nfd, resolve};
use ec_study::{Dataset, StudyConfig, StudyError};
use rust_xlsxwriter::Workbook;
use std::fs;
use std::path::Path;

const SCHOOLS: [&str; 4] = ["송도고", "하늘고", "아라고", "동산고"];

fn write_environment(dir: &Path, school: &str, base_temperature: f64) {
    let name = nfd(&format!("{school}_환경데이터.csv"));
    let body = format!(
        "time,temperature,humidity,ph,ec\n\
         2025-05-01 09:00,{},60,6.0,1.0\n\
         2025-05-01 10:00,{},70,6.4,1.4\n",
        base_temperature,
        base_temperature + 2.0
    );
    fs::write(dir.join(name), body).unwrap();
}

fn write_growth_workbook(dir: &Path, weights: &[(&str, Vec<f64>)]) {
    let mut workbook = Workbook::new();
    for (school, values) in weights {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*school).unwrap();
        sheet.write_string(0, 0, "개체번호").unwrap();
        sheet.write_string(0, 1, "생중량(g)").unwrap();
        sheet.write_string(0, 2, "잎 수(장)").unwrap();
        sheet.write_string(0, 3, "지상부 길이(mm)").unwrap();
        for (i, w) in values.iter().enumerate() {
            let row = (i + 1) as u32;
            sheet.write_number(row, 0, (i + 1) as f64).unwrap();
            sheet.write_number(row, 1, *w).unwrap();
            sheet.write_number(row, 2, w / 2.0).unwrap();
            sheet.write_number(row, 3, w * 4.0).unwrap();
        }
    }
    workbook
        .save(dir.join(nfd("4개교_생육결과데이터.xlsx")))
        .unwrap();
}

fn full_study(dir: &Path) {
    for (i, school) in SCHOOLS.iter().enumerate() {
        write_environment(dir, school, 14.0 + i as f64);
    }
    write_growth_workbook(
        dir,
        &[
            ("송도고", vec![9.0, 11.0]),
            ("하늘고", vec![24.0, 26.0]),
            ("아라고", vec![14.0, 16.0]),
            ("동산고", vec![4.0, 6.0]),
        ],
    );
}

#[test]
fn test_full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    full_study(dir.path());

    let config = StudyConfig::default();
    let dataset = Dataset::load(dir.path(), &config).expect("Failed to load dataset");
    assert!(dataset.unresolved().is_empty());
    assert_eq!(dataset.environment_tables().len(), 4);
    assert_eq!(dataset.growth_tables().len(), 4);

    let report = build_report(&dataset, &config.concentrations).unwrap();

    assert_eq!(report.summary.len(), 4);
    let targets: Vec<_> = report.summary.iter().map(|r| r.target_concentration).collect();
    assert_eq!(targets, vec![1.0, 2.0, 4.0, 8.0]);

    assert_eq!(report.optimal.school, nfc("하늘고"));
    assert_eq!(report.optimal.fresh_weight, 25.0);
    assert_eq!(report.optimal.leaf_count, 12.5);
    assert_eq!(report.optimal.target_concentration, 2.0);

    let songdo = &report.summary[0];
    assert_eq!(songdo.temperature, 15.0);
    assert_eq!(songdo.humidity, 65.0);
    assert_eq!(songdo.sample_count, 2);

    assert_eq!(report.overview.total_samples, 8);
    assert_eq!(report.fresh_weight_distribution.len(), 4);
}

#[test]
fn test_missing_environment_file_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    full_study(dir.path());
    fs::remove_file(dir.path().join(nfd("아라고_환경데이터.csv"))).unwrap();

    let config = StudyConfig::default();
    let dataset = Dataset::load(dir.path(), &config).unwrap();
    assert_eq!(dataset.unresolved().len(), 1);

    // inner join drops the school without environment data
    let report = build_report(&dataset, &config.concentrations).unwrap();
    assert_eq!(report.summary.len(), 3);
    assert!(report.summary.iter().all(|r| r.school != "아라고"));
    assert_eq!(report.growth.len(), 4);

    match dataset.environment_for("아라고") {
        Err(StudyError::NotFound { name, .. }) => assert_eq!(name, "아라고_환경데이터.csv"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn test_missing_workbook_stops_load() {
    let dir = tempfile::tempdir().unwrap();
    for school in SCHOOLS {
        write_environment(dir.path(), school, 15.0);
    }

    let err = Dataset::load(dir.path(), &StudyConfig::default()).unwrap_err();
    assert!(matches!(err, StudyError::NotFound { .. }));
}

#[test]
fn test_no_environment_files_is_empty_dataset() {
    let dir = tempfile::tempdir().unwrap();
    write_growth_workbook(dir.path(), &[("송도고", vec![1.0])]);

    let err = Dataset::load(dir.path(), &StudyConfig::default()).unwrap_err();
    assert!(matches!(err, StudyError::EmptyDataset { .. }));
}

#[test]
fn test_unmapped_sheet_fails_loudly() {
    let dir = tempfile::tempdir().unwrap();
    full_study(dir.path());
    write_growth_workbook(dir.path(), &[("송도고", vec![1.0]), ("인천고", vec![2.0])]);

    let config = StudyConfig::default();
    let dataset = Dataset::load(dir.path(), &config).unwrap();
    let err = build_report(&dataset, &config.concentrations).unwrap_err();
    assert!(matches!(err, StudyError::MissingMapping { school } if school == "인천고"));
}

#[test]
fn test_resolve_decomposed_name() {
    let dir = tempfile::tempdir().unwrap();
    let on_disk = dir.path().join(nfd("학교_데이터.csv"));
    fs::write(&on_disk, "x").unwrap();

    assert_eq!(resolve(dir.path(), "학교_데이터.csv").unwrap(), on_disk);
    assert!(matches!(
        resolve(dir.path(), "없는_데이터.csv"),
        Err(StudyError::NotFound { .. })
    ));
}

#[test]
fn test_exports_reload() {
    let dir = tempfile::tempdir().unwrap();
    full_study(dir.path());
    let dataset = Dataset::load(dir.path(), &StudyConfig::default()).unwrap();

    let out = tempfile::tempdir().unwrap();
    let csv_path = out.path().join("하늘고_환경데이터.csv");
    export_environment_csv(&csv_path, dataset.environment_for("하늘고").unwrap()).unwrap();
    let reloaded = ec_study::loader::read_environment_csv(&csv_path, "하늘고").unwrap();
    assert_eq!(reloaded, dataset.environment_for("하늘고").unwrap());

    let xlsx_path = out.path().join("growth.xlsx");
    export_growth_xlsx(&xlsx_path, dataset.growth_tables()).unwrap();
    let combined = ec_study::loader::read_growth_workbook(&xlsx_path).unwrap();
    assert_eq!(combined.len(), 1);
    assert_eq!(
        combined[0].columns,
        vec!["개체번호", "생중량(g)", "잎 수(장)", "지상부 길이(mm)", "school"]
    );

    let rows = &combined[0].rows;
    assert_eq!(rows.len(), 8);
    assert_eq!(rows[1].extra.get("개체번호"), Some(&SheetValue::Number(2.0)));
    assert_eq!(rows[1].fresh_weight, Some(11.0));
    assert_eq!(
        rows[2].extra.get("school"),
        Some(&SheetValue::Text(nfc("하늘고")))
    );
}
