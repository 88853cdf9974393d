//! End-to-end pipeline scenarios against scripted engines
//!
//! Each test runs real child processes (shell scripts standing in for the
//! TTS and concatenation engines) inside an isolated root folder.

#![cfg(unix)]

mod helpers;

use helpers::{count_rows, FakeTts, TestEnv};
use mantrify_common::Error;
use mantrify_queuer::config::MismatchPolicy;
use mantrify_queuer::db::{generated_audio, jobs, meditations, sound_files};
use mantrify_queuer::models::{Element, JobStage, JobStatus, MeditationRequest, WorkflowOutcome};
use mantrify_queuer::services::csv_files;
use serde_json::json;
use std::sync::Arc;

fn sample_request() -> MeditationRequest {
    MeditationRequest::from_array(
        12,
        json!([
            {"id": "1", "text": "Welcome to this meditation", "voice_id": "Xb7hH8MSUJpSbSDYk0k2"},
            {"id": "2", "pause_duration": "2.0"},
            {"id": "3", "text": "Breathe deeply", "speed": "0.9"}
        ]),
    )
}

/// TC-W-001: Speech, pause, speech runs to DONE with two linked speech files
#[tokio::test]
async fn test_speech_pause_speech_completes() {
    // Given: Well-behaved engines
    let env = TestEnv::new().await;
    let orchestrator = env.orchestrator();

    // When: The sample script is processed
    let outcome = orchestrator.process(&sample_request()).await.unwrap();

    // Then: The job is done and the final file recorded
    let WorkflowOutcome::Completed {
        job_id,
        final_file_path,
    } = outcome
    else {
        panic!("Expected completion, got {:?}", outcome);
    };
    let job = jobs::get_job(&env.db, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.user_id, 12);

    let meditation = meditations::find_by_job(&env.db, job_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(meditation.full_path(), final_file_path);
    assert_eq!(meditation.user_id, 12);
    assert_eq!(
        meditations::count_generated_links(&env.db, meditation.id)
            .await
            .unwrap(),
        2
    );
    assert_eq!(
        meditations::count_sound_file_links(&env.db, meditation.id)
            .await
            .unwrap(),
        0
    );

    // And: Speech files are stored per element in script order
    let generated = generated_audio::list_for_job(&env.db, job_id).await.unwrap();
    let element_ids: Vec<&str> = generated.iter().map(|g| g.element_id.as_str()).collect();
    assert_eq!(element_ids, vec!["1", "3"]);
    assert_eq!(generated[0].text, "Welcome to this meditation");

    // And: The TTS engine saw only speech, with the default speed filled in
    let tts_inputs = env.tts_inputs();
    assert_eq!(tts_inputs.len(), 1);
    assert_eq!(
        tts_inputs[0],
        "id,text,voice_id,speed\n\
         1,Welcome to this meditation,Xb7hH8MSUJpSbSDYk0k2,1.0\n\
         3,Breathe deeply,,0.9\n"
    );

    // And: The concatenation engine saw the full sequence
    let audio_out = env.root().join("audio_out");
    let concat_inputs = env.concat_inputs();
    assert_eq!(concat_inputs.len(), 1);
    assert_eq!(
        concat_inputs[0],
        format!(
            "id,audio_file_name_and_path,pause_duration\n\
             1,{0}/speech_1.mp3,\n\
             2,,2.0\n\
             3,{0}/speech_2.mp3,\n",
            audio_out.display()
        )
    );
}

/// TC-W-002: A malformed script is rejected before any job exists
#[tokio::test]
async fn test_invalid_request_creates_no_job() {
    let env = TestEnv::new().await;
    let orchestrator = env.orchestrator();

    let request = MeditationRequest::from_array(
        1,
        json!([
            {"id": "1", "text": "Hello"},
            {"id": "2", "sound_file": "bell.mp3", "pause_duration": "1.0"}
        ]),
    );

    let result = orchestrator.process(&request).await;

    match result {
        Err(Error::Validation { details, .. }) => {
            assert_eq!(details.len(), 1);
            assert_eq!(details[0].index, 1);
        }
        other => panic!("Expected validation error, got {:?}", other),
    }
    assert_eq!(count_rows(&env.db, "jobs").await, 0);
    assert!(env.tts_inputs().is_empty());
}

/// TC-W-003: A TTS failure fails the job at ELEVENLABS and skips concatenation
#[tokio::test]
async fn test_tts_failure_fails_at_elevenlabs() {
    let env = TestEnv::with(FakeTts::Fail, MismatchPolicy::Strict).await;
    let orchestrator = env.orchestrator();

    let outcome = orchestrator.process(&sample_request()).await.unwrap();

    let WorkflowOutcome::Failed {
        job_id,
        stage_reached,
        error,
    } = outcome
    else {
        panic!("Expected failure, got {:?}", outcome);
    };
    assert_eq!(stage_reached, JobStage::Elevenlabs);
    assert!(matches!(error, Error::ProcessFailure { .. }));
    assert!(error.to_string().contains("quota exceeded"));

    let job = jobs::get_job(&env.db, job_id).await.unwrap().unwrap();
    match job.status {
        JobStatus::Failed {
            stage_reached,
            cause,
        } => {
            assert_eq!(stage_reached, JobStage::Elevenlabs);
            assert!(cause.contains("quota exceeded"));
        }
        other => panic!("Expected failed job, got {:?}", other),
    }

    assert!(env.concat_inputs().is_empty());
    assert_eq!(count_rows(&env.db, "generated_audio").await, 0);
    assert_eq!(count_rows(&env.db, "meditations").await, 0);
}

/// TC-W-004: Clips resolve through the catalog; a repeated clip links once
/// and an unknown clip is left out
#[tokio::test]
async fn test_sound_clips_resolved_and_deduplicated() {
    let env = TestEnv::new().await;
    let clip_dir = env.root().join("clips");
    let bell_id = sound_files::register_sound_file(
        &env.db,
        "bell.mp3",
        &clip_dir.display().to_string(),
        Some("Tibetan bell"),
    )
    .await
    .unwrap();
    assert!(bell_id > 0);

    let request = MeditationRequest::from_array(
        3,
        json!([
            {"id": "1", "sound_file": "bell.mp3"},
            {"id": "2", "text": "Settle in"},
            {"id": "3", "sound_file": "gong.mp3"},
            {"id": "4", "sound_file": "bell.mp3"}
        ]),
    );

    let outcome = env.orchestrator().process(&request).await.unwrap();
    assert!(outcome.is_completed(), "{:?}", outcome);

    let meditation = meditations::find_by_job(&env.db, outcome.job_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        meditations::count_sound_file_links(&env.db, meditation.id)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        meditations::count_generated_links(&env.db, meditation.id)
            .await
            .unwrap(),
        1
    );

    let bell = clip_dir.join("bell.mp3").display().to_string();
    let concat = &env.concat_inputs()[0];
    let lines: Vec<&str> = concat.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[1], format!("1,{},", bell));
    assert!(lines[2].starts_with("2,"));
    assert_eq!(lines[3], format!("4,{},", bell));
    assert!(!concat.contains("gong.mp3"));
}

/// TC-W-005: Strict policy fails when the engine reports too few files
#[tokio::test]
async fn test_strict_mismatch_fails_job() {
    let env = TestEnv::with(FakeTts::ReportOnly(1), MismatchPolicy::Strict).await;

    let outcome = env.orchestrator().process(&sample_request()).await.unwrap();

    match outcome {
        WorkflowOutcome::Failed {
            stage_reached,
            error,
            ..
        } => {
            assert_eq!(stage_reached, JobStage::Elevenlabs);
            assert!(error
                .to_string()
                .contains("TTS engine reported 1 files for 2 speech elements"));
        }
        other => panic!("Expected failure, got {:?}", other),
    }
    assert!(env.concat_inputs().is_empty());
}

/// TC-W-006: Lenient policy pairs by position and drops the unmatched speech
#[tokio::test]
async fn test_lenient_mismatch_drops_unpaired_speech() {
    let env = TestEnv::with(FakeTts::ReportOnly(1), MismatchPolicy::Lenient).await;

    let outcome = env.orchestrator().process(&sample_request()).await.unwrap();
    assert!(outcome.is_completed(), "{:?}", outcome);

    let generated = generated_audio::list_for_job(&env.db, outcome.job_id())
        .await
        .unwrap();
    assert_eq!(generated.len(), 1);
    assert_eq!(generated[0].element_id, "1");

    let concat = &env.concat_inputs()[0];
    let ids: Vec<&str> = concat
        .lines()
        .skip(1)
        .map(|line| line.split(',').next().unwrap())
        .collect();
    assert_eq!(ids, vec!["1", "2"]);
}

/// TC-W-007: A script without speech never starts the TTS engine
#[tokio::test]
async fn test_no_speech_skips_tts() {
    let env = TestEnv::new().await;
    sound_files::register_sound_file(&env.db, "rain.mp3", "/srv/clips", None)
        .await
        .unwrap();

    let request = MeditationRequest::from_array(
        5,
        json!([
            {"id": "1", "sound_file": "rain.mp3"},
            {"id": "2", "pause_duration": "5"}
        ]),
    );

    let outcome = env.orchestrator().process(&request).await.unwrap();

    assert!(outcome.is_completed(), "{:?}", outcome);
    assert!(env.tts_inputs().is_empty());
    assert_eq!(
        env.concat_inputs()[0],
        "id,audio_file_name_and_path,pause_duration\n1,/srv/clips/rain.mp3,\n2,,5\n"
    );
}

/// TC-W-008: A request file uploaded by the caller is processed like an array
#[tokio::test]
async fn test_csv_request_completes() {
    let env = TestEnv::new().await;
    env.upload_request_csv(
        "evening.csv",
        "id,text,voice_id,speed,pause_duration,sound_file\n\
         1,\"Relax, and breathe\",,,,\n\
         2,,,,3.0,\n",
    );

    let outcome = env
        .orchestrator()
        .process(&MeditationRequest::from_csv(8, "evening.csv"))
        .await
        .unwrap();

    assert!(outcome.is_completed(), "{:?}", outcome);
    let tts = &env.tts_inputs()[0];
    assert!(tts.contains("1,\"Relax, and breathe\",,1.0"));
}

/// TC-W-009: A missing request file is NotFound and creates no job
#[tokio::test]
async fn test_missing_csv_request_is_not_found() {
    let env = TestEnv::new().await;

    let result = env
        .orchestrator()
        .process(&MeditationRequest::from_csv(8, "absent.csv"))
        .await;

    assert!(matches!(result, Err(Error::NotFound(_))));
    assert_eq!(count_rows(&env.db, "jobs").await, 0);
}

/// TC-W-010: The worker drains queued jobs oldest first and keeps the last error
#[tokio::test]
async fn test_worker_drains_queue_in_order() {
    let env = TestEnv::new().await;
    let state = env.app_state();

    let first = state
        .orchestrator
        .enqueue(1, &[Element::speech("1", "First")])
        .await
        .unwrap();
    // Snapshot deleted behind the store's back: this job cannot be loaded
    let broken = state
        .orchestrator
        .enqueue(2, &[Element::speech("1", "Second")])
        .await
        .unwrap();
    let snapshot = csv_files::snapshot_path(&env.config.paths.queuer_dir, &broken.job_filename)
        .unwrap();
    std::fs::remove_file(&snapshot).unwrap();

    let worker = state.job_worker();
    let outcomes = worker.drain().await.unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].job_id(), first.id);
    assert!(outcomes[0].is_completed());
    assert_eq!(outcomes[1].job_id(), broken.id);
    match &outcomes[1] {
        WorkflowOutcome::Failed { stage_reached, .. } => {
            assert_eq!(*stage_reached, JobStage::Queued)
        }
        other => panic!("Expected failure, got {:?}", other),
    }

    let last_error = state.last_error.read().await.clone().unwrap();
    assert!(last_error.contains(&format!("Job {} failed", broken.id)));

    let counts = jobs::counts_by_status(&env.db).await.unwrap();
    assert_eq!(counts.done, 1);
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.queued, 0);
}

/// TC-W-011: Concurrent submissions never overlap engine invocations
#[tokio::test]
async fn test_concurrent_process_calls_are_serialized() {
    let env = TestEnv::new().await;
    let orchestrator = Arc::new(env.orchestrator());

    let handles: Vec<_> = (1..=3)
        .map(|user_id| {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                let request = MeditationRequest::from_array(
                    user_id,
                    json!([{"id": "1", "text": format!("Hello {}", user_id)}]),
                );
                orchestrator.process(&request).await
            })
        })
        .collect();

    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert!(outcome.is_completed(), "{:?}", outcome);
    }

    assert_eq!(env.tts_inputs().len(), 3);
    assert_eq!(jobs::counts_by_status(&env.db).await.unwrap().done, 3);

    // Every engine run ends before the next one starts
    let runs = env.engine_runs();
    assert_eq!(runs.len(), 12, "{:?}", runs);
    for pair in runs.chunks(2) {
        let engine = pair[0].strip_suffix(" start").unwrap_or_else(|| {
            panic!("Run started while another was active: {:?}", runs)
        });
        assert_eq!(pair[1], format!("{} end", engine), "{:?}", runs);
    }
}

/// TC-W-012: A stale copy of a finished job is not run a second time
#[tokio::test]
async fn test_stale_job_is_skipped() {
    let env = TestEnv::new().await;
    let orchestrator = env.orchestrator();

    let job = orchestrator
        .enqueue(1, &[Element::speech("1", "Once only")])
        .await
        .unwrap();

    let first = orchestrator.run_job(job.clone()).await;
    assert!(first.is_completed(), "{:?}", first);

    let second = orchestrator.run_job(job.clone()).await;
    match second {
        WorkflowOutcome::Skipped { job_id, status } => {
            assert_eq!(job_id, job.id);
            assert_eq!(status, JobStatus::Done);
        }
        other => panic!("Expected skip, got {:?}", other),
    }

    assert_eq!(env.tts_inputs().len(), 1);
    assert_eq!(count_rows(&env.db, "meditations").await, 1);
}

/// TC-W-013: A failure that cannot be recorded does not spin the worker
#[tokio::test]
async fn test_unrecordable_failure_stops_drain() {
    let env = TestEnv::new().await;
    let state = env.app_state();

    let job = state
        .orchestrator
        .enqueue(1, &[Element::speech("1", "Stuck")])
        .await
        .unwrap();
    sqlx::query(
        "CREATE TRIGGER hold_jobs BEFORE UPDATE ON jobs \
         BEGIN SELECT RAISE(ABORT, 'jobs are read-only'); END",
    )
    .execute(&env.db)
    .await
    .unwrap();

    let outcomes = state.job_worker().drain().await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].job_id(), job.id);
    assert!(matches!(outcomes[0], WorkflowOutcome::Failed { .. }));
    assert!(state.last_error.read().await.is_some());

    let stored = jobs::get_job(&env.db, job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Queued);
    assert!(env.tts_inputs().is_empty());
}
