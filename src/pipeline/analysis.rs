// Analysis run
// Admission -> refinement -> document assembly for one set of model events

use chrono::Utc;
use uuid::Uuid;

use super::document::{
    DocumentMetadata, NoteRecord, NotesDocument, ProcessingPipeline, RunStatistics, SourceInfo,
    ANALYSIS_METHOD,
};
use super::trace::{TraceBuilder, TraceEntry};
use crate::config::Config;
use crate::notes::{admit_events, round_millis, total_duration, Note, RawNoteEvent};
use crate::refine::{refine_notes_with_observer, RefineStage, StageReport};
use crate::refine::stats::filter_rate_percent;

/// Run progress after admission
const ADMISSION_PROGRESS: f32 = 0.60;

/// Run progress once each refinement stage completes
fn stage_progress(stage: RefineStage) -> f32 {
    match stage {
        RefineStage::Density => 0.70,
        RefineStage::Harmonic => 0.75,
        RefineStage::Merge => 0.85,
        RefineStage::Velocity => 0.90,
    }
}

/// Everything one run produced
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub document: NotesDocument,

    /// Refined notes at full precision, for further export
    pub notes: Vec<Note>,

    /// Progress entries in the order they happened
    pub trace: Vec<TraceEntry>,
}

/// Admit, refine and package one set of raw model events
///
/// Never fails; empty or fully rejected input yields an empty document.
pub fn analyze_events(raw: &[RawNoteEvent], source: SourceInfo, config: &Config) -> AnalysisOutput {
    analyze_events_with_observer(raw, source, config, |_| {})
}

/// Like [`analyze_events`], handing each progress entry to `observer` as
/// soon as its stage completes
pub fn analyze_events_with_observer<F>(
    raw: &[RawNoteEvent],
    source: SourceInfo,
    config: &Config,
    mut observer: F,
) -> AnalysisOutput
where
    F: FnMut(&TraceEntry),
{
    let run_id = Uuid::new_v4();
    let trace = TraceBuilder::for_run(run_id);
    let mut entries = Vec::new();
    let mut emit = |entry: TraceEntry| {
        observer(&entry);
        entries.push(entry);
    };
    emit(trace.start("admission", format!("Received {} raw events", raw.len())));

    let (candidates, admission) = admit_events(raw, &config.admission);
    emit(
        trace
            .progress(
                "admission",
                ADMISSION_PROGRESS,
                format!("Admitted {} of {} events", admission.admitted, admission.raw_count),
            )
            .with_data(serde_json::json!(admission)),
    );

    let result = refine_notes_with_observer(candidates, &config.refinement, |report: StageReport| {
        let message = if report.enabled {
            format!("{} notes remaining", report.notes_remaining)
        } else {
            "Stage disabled, input passed through".to_string()
        };
        emit(
            trace
                .progress(report.stage.name(), stage_progress(report.stage), message)
                .with_data(serde_json::json!({
                    "enabled": report.enabled,
                    "notes_remaining": report.notes_remaining,
                })),
        );
    });

    let notes = result.notes;
    let statistics = RunStatistics {
        original_count: admission.raw_count,
        final_count: notes.len(),
        filter_rate_percent: filter_rate_percent(admission.raw_count, notes.len()),
        admission,
        refinement: result.statistics,
    };

    log::info!(
        "[Analysis] Filter statistics: {} raw -> {} notes ({:.1}% filtered)",
        statistics.original_count,
        statistics.final_count,
        statistics.filter_rate_percent
    );

    let duration = total_duration(&notes);
    let document = NotesDocument {
        metadata: DocumentMetadata {
            run_id,
            created_at: Utc::now(),
            source,
            total_duration: round_millis(duration),
            note_count: notes.len(),
            analysis_method: ANALYSIS_METHOD.to_string(),
            processing_pipeline: ProcessingPipeline::from_config(config),
            parameters: config.clone(),
            statistics,
        },
        notes: notes.iter().map(NoteRecord::from).collect(),
    };

    emit(trace.complete(
        "complete",
        format!("{} notes, total duration {:.2}s", document.metadata.note_count, duration),
    ));

    AnalysisOutput {
        document,
        notes,
        trace: entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_events() -> Vec<RawNoteEvent> {
        vec![
            RawNoteEvent::new(0.00, 0.04, 60, 50.0),
            RawNoteEvent::new(0.06, 0.11, 60, 70.0),
            RawNoteEvent::new(1.00, 1.50, 48, 100.0),
            RawNoteEvent::new(1.00, 1.50, 60, 30.0),
            RawNoteEvent::new(2.00, 2.50, 10, 90.0),
            RawNoteEvent::new(3.00, 9.00, 40, 90.0),
        ]
    }

    #[test]
    fn test_analyze_empty_input() {
        let output = analyze_events(&[], SourceInfo::named("silence.wav"), &Config::default());

        assert!(output.notes.is_empty());
        assert!(output.document.notes.is_empty());
        assert_eq!(output.document.metadata.total_duration, 0.0);
        assert_eq!(output.document.metadata.statistics.filter_rate_percent, 0.0);
    }

    #[test]
    fn test_analyze_events_populates_document() {
        let mut config = Config::default();
        config.refinement.merge.min_gap = 0.05;

        let output = analyze_events(&sample_events(), SourceInfo::named("song.mp3"), &config);
        let metadata = &output.document.metadata;
        let stats = &metadata.statistics;

        assert_eq!(stats.original_count, 6);
        assert_eq!(stats.admission.out_of_range, 1);
        assert_eq!(stats.refinement.harmonic_removed_count, 1);
        assert_eq!(stats.refinement.merged_count, 1);
        assert_eq!(stats.refinement.truncated_count, 1);
        assert_eq!(stats.final_count, 3);
        assert_eq!(metadata.note_count, 3);
        assert_eq!(metadata.source.name, "song.mp3");
        assert_eq!(metadata.total_duration, 6.0);
        assert_eq!(metadata.parameters.refinement.merge.min_gap, 0.05);

        let pitches: Vec<u8> = output.document.notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![60, 48, 40]);
    }

    #[test]
    fn test_trace_covers_run() {
        let output = analyze_events(&sample_events(), SourceInfo::named("song.mp3"), &Config::default());

        let stages: Vec<&str> = output.trace.iter().map(|e| e.stage.as_str()).collect();
        assert_eq!(
            stages,
            vec!["admission", "admission", "density", "harmonic", "merge", "velocity", "complete"]
        );

        for pair in output.trace.windows(2) {
            assert!(pair[0].progress <= pair[1].progress);
        }
        assert!(output
            .trace
            .iter()
            .all(|e| e.run_id == output.document.metadata.run_id));
    }

    #[test]
    fn test_observer_sees_entries_as_they_happen() {
        let mut seen = Vec::new();
        let output = analyze_events_with_observer(
            &sample_events(),
            SourceInfo::named("song.mp3"),
            &Config::default(),
            |entry| seen.push((entry.stage.clone(), entry.progress)),
        );

        assert_eq!(seen.len(), output.trace.len());
        assert_eq!(seen.first(), Some(&("admission".to_string(), 0.0)));
        assert_eq!(seen.last(), Some(&("complete".to_string(), 1.0)));
        assert!(seen.contains(&("merge".to_string(), 0.85)));
    }

    #[test]
    fn test_document_round_trips_through_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.json");
        let output = analyze_events(&sample_events(), SourceInfo::named("song.mp3"), &Config::default());

        output.document.write(&path).unwrap();
        let read_back = NotesDocument::read(&path).unwrap();

        assert_eq!(read_back.notes, output.document.notes);
        assert_eq!(read_back.metadata.run_id, output.document.metadata.run_id);
    }
}
