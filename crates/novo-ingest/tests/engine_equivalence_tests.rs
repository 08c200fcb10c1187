//! Batch and local engines must agree
//!
//! Same input, same prior state: both engines have to produce the same
//! identities, the same novelty decisions, the same typed rows and the same
//! resulting state, whatever the partitioning.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use anyhow::Result;
use common::{cases_descriptor, init_tracing, persisted_rows, TestWorkspace};
use novo_ingest::engine::{BatchEngine, Engine, EngineKind, LocalEngine};
use novo_ingest::{Ingestor, RunSummary, StateStore};
use std::fmt::Write;
use std::sync::Arc;

fn generated_csv(rows: usize, offset: usize) -> String {
    let mut csv = String::from("country,date,cases,rate,ignored\n");
    for i in 0..rows {
        let n = i + offset;
        let country = match n % 4 {
            0 => "",
            1 => "X",
            2 => "Y",
            _ => "Z Land",
        };
        let day = 1 + (n / 4) % 20;
        let cases = if n % 7 == 0 {
            "n/a".to_string()
        } else {
            format!("{},{:03}", n / 1000 + 1, n % 1000)
        };
        writeln!(csv, "{},2020-02-{:02},\"{}\",{}.25,x", country, day, cases, n).unwrap();
    }
    csv
}

fn comparable(summary: &RunSummary) -> (usize, usize, usize, usize, usize, usize) {
    (
        summary.total_read,
        summary.total_novel,
        summary.already_seen,
        summary.duplicates_in_batch,
        summary.malformed,
        summary.state_size,
    )
}

#[test]
fn test_engines_agree_across_runs() -> Result<()> {
    init_tracing();

    let descriptor = cases_descriptor();
    let local = TestWorkspace::new();
    let batch = TestWorkspace::new();

    let engines: [(&TestWorkspace, Arc<dyn Engine>); 2] = [
        (&local, Arc::new(LocalEngine::new(local.typed_dir()))),
        (&batch, Arc::new(BatchEngine::new(batch.typed_dir(), 7, 4)?)),
    ];
    let ingestors: Vec<Ingestor> = engines
        .iter()
        .map(|(ws, engine)| Ingestor::new(engine.clone(), ws.state_store()))
        .collect();

    // Second input overlaps the first and repeats keys within itself
    for input in [generated_csv(60, 0), generated_csv(90, 30), generated_csv(40, 110)] {
        let summaries: Vec<RunSummary> = ingestors
            .iter()
            .zip([&local, &batch])
            .map(|(ingestor, ws)| {
                ws.write_raw("cases", &input);
                ingestor.run(&ws.job(&descriptor)).unwrap()
            })
            .collect();

        assert_eq!(summaries[0].engine, EngineKind::Local);
        assert_eq!(summaries[1].engine, EngineKind::Batch);
        assert_eq!(comparable(&summaries[0]), comparable(&summaries[1]));
    }

    assert_eq!(
        local.state_store().load("cases")?,
        batch.state_store().load("cases")?
    );
    assert_eq!(
        persisted_rows(ingestors[0].engine(), &descriptor),
        persisted_rows(ingestors[1].engine(), &descriptor)
    );
    Ok(())
}

#[test]
fn test_partition_size_does_not_change_results() -> Result<()> {
    let descriptor = cases_descriptor();
    let input = generated_csv(45, 3);

    let mut results = Vec::new();
    for partition_size in [1, 4, 1000] {
        let ws = TestWorkspace::new();
        ws.write_raw("cases", &input);
        let engine: Arc<dyn Engine> =
            Arc::new(BatchEngine::new(ws.typed_dir(), partition_size, 3)?);
        let ingestor = Ingestor::new(engine, ws.state_store());

        let summary = ingestor.run(&ws.job(&descriptor))?;
        results.push((
            comparable(&summary),
            ws.state_store().load("cases")?,
            persisted_rows(ingestor.engine(), &descriptor),
        ));
    }

    assert_eq!(results[0], results[1]);
    assert_eq!(results[1], results[2]);
    Ok(())
}
