//! パフォーマンスベンチマーク
//!
//! このモジュールは、storagereportクレートのパフォーマンスを測定するためのベンチマークを提供します。
//!
//! 実装するベンチマーク:
//! - フィールド抽出（ノイズ行を多く含むワークブック）
//! - テンプレートの走査と描画（同梱テンプレート）
//! - ラベル照合

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rust_xlsxwriter::{Workbook, XlsxError};
use storagereport::{
    Field, LabelMatcher, LabelTable, ReportBuilder, DELINQUENCY_TOKENS, OWNER_REPORT_TEMPLATE,
};

/// 管理ソフトの出力を模したワークブックを生成
///
/// `noise_rows`行のテナント明細の後にサマリーと延滞集計を配置します。
fn generate_export(noise_rows: u32) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();

    let rent_roll = workbook.add_worksheet();
    rent_roll.set_name("Rent Roll")?;
    rent_roll.write_string(0, 0, "Unit")?;
    rent_roll.write_string(0, 1, "Tenant")?;
    rent_roll.write_string(0, 2, "Balance")?;
    for row in 1..=noise_rows {
        rent_roll.write_string(row, 0, &format!("U{:05}", row))?;
        rent_roll.write_string(row, 1, &format!("Tenant {}", row))?;
        rent_roll.write_number(row, 2, (row % 400) as f64 * 1.25)?;
    }

    let summary = workbook.add_worksheet();
    summary.set_name("Summary")?;
    let labels = [
        "Facility Name",
        "Total Units",
        "Occupied Units",
        "Vacant Units",
        "Unit Occupancy %",
        "Gross Potential Rent",
        "Delinquent % 0-30",
        "Delinquent Units 0-30",
        "Delinquent $ 0-30",
        "Delinquent % 31-60",
        "Delinquent Units 31-60",
        "Delinquent $ 31-60",
        "Delinquent % 61+",
        "Delinquent Units 61+",
        "Delinquent $ 61+",
    ];
    for (row, label) in labels.iter().enumerate() {
        summary.write_string(row as u32, 0, *label)?;
        if row == 0 {
            summary.write_string(0, 1, "Benchmark Storage")?;
        } else {
            summary.write_number(row as u32, 1, row as f64 * 3.5)?;
        }
    }

    workbook.save_to_buffer()
}

fn benchmark_extraction(c: &mut Criterion) {
    let engine = ReportBuilder::new().build().unwrap();

    let mut group = c.benchmark_group("extraction");
    for noise_rows in [100u32, 10_000] {
        let data = generate_export(noise_rows).unwrap();
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_function(format!("extract_{}_rows", noise_rows), |b| {
            b.iter(|| {
                let extraction = engine
                    .extract_with_provenance(
                        black_box(&data),
                        "export.xlsx",
                        black_box(&DELINQUENCY_TOKENS),
                    )
                    .unwrap();
                black_box(extraction)
            });
        });
    }
    group.finish();
}

fn benchmark_template(c: &mut Criterion) {
    let engine = ReportBuilder::new().build().unwrap();
    let data = generate_export(100).unwrap();
    let record = engine.extract_fields(&data, "export.xlsx").unwrap();

    let mut group = c.benchmark_group("template");
    group.throughput(Throughput::Bytes(OWNER_REPORT_TEMPLATE.len() as u64));

    group.bench_function("scan_owner_report", |b| {
        b.iter(|| {
            let scan = engine
                .validate_template(black_box(OWNER_REPORT_TEMPLATE), &Field::ALL)
                .unwrap();
            black_box(scan)
        });
    });

    group.bench_function("render_owner_report", |b| {
        b.iter(|| {
            let output = engine
                .render_template(black_box(OWNER_REPORT_TEMPLATE), black_box(&record))
                .unwrap();
            black_box(output)
        });
    });

    group.finish();
}

fn benchmark_label_matching(c: &mut Criterion) {
    let table = LabelTable::standard();
    let matcher = LabelMatcher::new(&table, 0.6);
    let labels = [
        "Total Units:",
        "Delinquent $ 61+",
        "MOVE-INS MTD",
        "Unit Occupancy % (rentable)",
        "Tenant 1234",
        "U00042",
    ];

    c.bench_function("match_labels", |b| {
        b.iter(|| {
            for label in &labels {
                black_box(matcher.match_label(black_box(label)));
            }
        });
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(std::time::Duration::from_secs(10))
        .warm_up_time(std::time::Duration::from_secs(3));
    targets = benchmark_extraction, benchmark_template, benchmark_label_matching
}

criterion_main!(benches);
