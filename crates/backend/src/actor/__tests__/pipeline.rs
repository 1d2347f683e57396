#[cfg(test)]
mod tests {
  use std::{sync::Arc, time::Duration};

  use pretty_assertions::assert_eq;
  use tokio::{sync::mpsc, time::timeout};
  use tokio_util::sync::CancellationToken;

  use crate::{
    actor::{
      FileWatcher, Processor, RunState, StatusRefresher,
      __tests__::helpers::{
        AVATAR_A, AVATAR_B, AVATAR_C, FakeTarget, FixedMetadata, PipelineContext, PresenceEvent, RecordingPresence,
        append_and_bump, dispatcher, id, log_line,
      },
    },
    domain::config::StatusConfig,
    presence::{MAX_DESCRIPTION_LENGTH, STATUS_PROCESSING, STATUS_WATCHING},
    upload::{SubmitOutcome, TargetKind},
  };

  fn two_of_three() -> Vec<Arc<FakeTarget>> {
    vec![
      FakeTarget::new(TargetKind::AvtrDb, SubmitOutcome::Accepted),
      FakeTarget::new(TargetKind::Paw, SubmitOutcome::Exhausted),
      FakeTarget::new(TargetKind::VrcWb, SubmitOutcome::Accepted),
    ]
  }

  #[tokio::test]
  async fn test_new_avatar_flows_through_to_detailed_status() {
    let ctx = PipelineContext::new().await;
    let noise = "2025.01.01 12:00:00 Log        -  [Behaviour] OnPlayerJoined someone\n";
    let content = format!("{noise}{}{noise}{}", log_line(AVATAR_A), log_line(AVATAR_A));
    let path = ctx.write_log("output_log_1.txt", &content);

    let targets = two_of_three();
    let presence = RecordingPresence::connected();
    let state = Arc::new(RunState::new());
    let (tx, rx) = mpsc::channel(4);

    let processor = Processor::new(
      rx,
      ctx.cache.clone(),
      dispatcher(&targets),
      presence.clone(),
      Arc::clone(&state),
      CancellationToken::new(),
    );
    let handle = processor.spawn();

    tx.send(path).await.unwrap();
    drop(tx);
    timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

    for target in &targets {
      assert_eq!(target.submitted(), vec![id(AVATAR_A)]);
    }
    assert_eq!(state.latest().await, Some(id(AVATAR_A)));
    assert_eq!(
      presence.statuses(),
      vec![STATUS_PROCESSING.to_string(), STATUS_WATCHING.to_string()]
    );

    // Next status tick
    let description = "d".repeat(400);
    let metadata = FixedMetadata::new("Fox", "Someone", &description);
    let refresher = StatusRefresher::new(
      Arc::clone(&state),
      presence.clone(),
      metadata.clone(),
      &StatusConfig::default(),
      CancellationToken::new(),
    );
    refresher.refresh().await;

    let Some(PresenceEvent::Detailed(status)) = presence.last() else {
      panic!("expected a detailed status, got {:?}", presence.last());
    };
    assert_eq!(status.details, "Fox");
    assert_eq!(status.state, "by Someone");
    assert_eq!(status.description.chars().count(), MAX_DESCRIPTION_LENGTH);
    assert!(status.description.ends_with("..."));

    // Metadata is cached for the same avatar
    refresher.refresh().await;
    assert_eq!(metadata.calls(), 1);
  }

  #[tokio::test]
  async fn test_log_growth_reaches_detailed_status() {
    let ctx = PipelineContext::new().await;
    let path = ctx.write_log("output_log_1.txt", "2025.01.01 12:00:00 Log        -  startup\n");

    let targets = two_of_three();
    let presence = RecordingPresence::connected();
    let metadata = FixedMetadata::new("Fox", "Someone", &"d".repeat(400));
    let state = Arc::new(RunState::new());
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(4);

    let mut watcher = FileWatcher::new(tx, Duration::from_millis(20), cancel.child_token());
    watcher.register(&path).unwrap();
    let status_config = StatusConfig {
      refresh_interval_secs: 1,
      ..Default::default()
    };

    let handles = vec![
      watcher.spawn(),
      Processor::new(
        rx,
        ctx.cache.clone(),
        dispatcher(&targets),
        presence.clone(),
        Arc::clone(&state),
        cancel.child_token(),
      )
      .spawn(),
      StatusRefresher::new(
        Arc::clone(&state),
        presence.clone(),
        metadata.clone(),
        &status_config,
        cancel.child_token(),
      )
      .spawn(),
    ];

    append_and_bump(&path, &log_line(AVATAR_A), 5);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    let status = loop {
      if let Some(PresenceEvent::Detailed(status)) = presence.last() {
        break status;
      }
      assert!(tokio::time::Instant::now() < deadline, "no detailed status, got {:?}", presence.events());
      tokio::time::sleep(Duration::from_millis(50)).await;
    };

    cancel.cancel();
    for handle in handles {
      timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }

    for target in &targets {
      assert_eq!(target.submitted(), vec![id(AVATAR_A)]);
    }
    assert_eq!(state.latest().await, Some(id(AVATAR_A)));
    assert!(presence.statuses().contains(&STATUS_PROCESSING.to_string()));
    assert_eq!(status.details, "Fox");
    assert_eq!(status.state, "by Someone");
    assert_eq!(status.description.chars().count(), MAX_DESCRIPTION_LENGTH);
    assert!(status.description.ends_with("..."));
    assert_eq!(metadata.calls(), 1);
  }

  #[tokio::test]
  async fn test_failed_uploads_do_not_confirm() {
    let ctx = PipelineContext::new().await;
    let path = ctx.write_log("output_log_1.txt", &log_line(AVATAR_A));

    let targets = vec![
      FakeTarget::new(TargetKind::AvtrDb, SubmitOutcome::Rejected { status: 500 }),
      FakeTarget::new(TargetKind::Paw, SubmitOutcome::Exhausted),
    ];
    let state = Arc::new(RunState::new());
    let (tx, rx) = mpsc::channel(4);

    let handle = Processor::new(
      rx,
      ctx.cache.clone(),
      dispatcher(&targets),
      RecordingPresence::connected(),
      Arc::clone(&state),
      CancellationToken::new(),
    )
    .spawn();

    tx.send(path).await.unwrap();
    drop(tx);
    handle.await.unwrap();

    assert_eq!(targets[0].submitted(), vec![id(AVATAR_A)]);
    assert_eq!(state.latest().await, None);
  }

  #[tokio::test]
  async fn test_repeated_paths_dispatch_once() {
    let ctx = PipelineContext::new().await;
    let path = ctx.write_log("output_log_1.txt", &log_line(AVATAR_A));

    let targets = vec![FakeTarget::new(TargetKind::AvtrDb, SubmitOutcome::Accepted)];
    let (tx, rx) = mpsc::channel(4);

    let handle = Processor::new(
      rx,
      ctx.cache.clone(),
      dispatcher(&targets),
      RecordingPresence::connected(),
      Arc::new(RunState::new()),
      CancellationToken::new(),
    )
    .spawn();

    tx.send(path.clone()).await.unwrap();
    tx.send(path).await.unwrap();
    drop(tx);
    handle.await.unwrap();

    assert_eq!(targets[0].submitted(), vec![id(AVATAR_A)]);
  }

  #[tokio::test]
  async fn test_cache_suppresses_across_sessions() {
    let ctx = PipelineContext::new().await;
    let path = ctx.write_log("output_log_1.txt", &log_line(AVATAR_A));

    for expected in [1, 0] {
      let targets = vec![FakeTarget::new(TargetKind::AvtrDb, SubmitOutcome::Accepted)];
      let (tx, rx) = mpsc::channel(4);
      let handle = Processor::new(
        rx,
        ctx.cache.clone(),
        dispatcher(&targets),
        RecordingPresence::connected(),
        Arc::new(RunState::new()),
        CancellationToken::new(),
      )
      .spawn();

      tx.send(path.clone()).await.unwrap();
      drop(tx);
      handle.await.unwrap();

      assert_eq!(targets[0].submitted().len(), expected);
    }
  }

  #[tokio::test]
  async fn test_shutdown_drains_queued_paths() {
    let ctx = PipelineContext::new().await;
    let paths = [
      ctx.write_log("output_log_1.txt", &log_line(AVATAR_A)),
      ctx.write_log("output_log_2.txt", &log_line(AVATAR_B)),
      ctx.write_log("output_log_3.txt", &log_line(AVATAR_C)),
    ];

    let targets = vec![FakeTarget::new(TargetKind::Paw, SubmitOutcome::Accepted)];
    let (tx, rx) = mpsc::channel(4);
    for path in paths {
      tx.send(path).await.unwrap();
    }

    // Already cancelled: the loop exits immediately and only the drain runs
    let cancel = CancellationToken::new();
    cancel.cancel();

    let handle = Processor::new(
      rx,
      ctx.cache.clone(),
      dispatcher(&targets),
      RecordingPresence::connected(),
      Arc::new(RunState::new()),
      cancel,
    )
    .spawn();
    timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

    let mut submitted = targets[0].submitted();
    submitted.sort();
    let mut expected = vec![id(AVATAR_A), id(AVATAR_B), id(AVATAR_C)];
    expected.sort();
    assert_eq!(submitted, expected);

    // The sender sees a closed queue
    assert!(tx.send(ctx.log_path("late.txt")).await.is_err());
  }

  #[tokio::test]
  async fn test_disconnected_presence_is_skipped() {
    let ctx = PipelineContext::new().await;
    let path = ctx.write_log("output_log_1.txt", &log_line(AVATAR_A));
    let presence = RecordingPresence::disconnected();
    let (tx, rx) = mpsc::channel(4);

    let handle = Processor::new(
      rx,
      ctx.cache.clone(),
      dispatcher(&[FakeTarget::new(TargetKind::AvtrDb, SubmitOutcome::Accepted)]),
      presence.clone(),
      Arc::new(RunState::new()),
      CancellationToken::new(),
    )
    .spawn();

    tx.send(path).await.unwrap();
    drop(tx);
    handle.await.unwrap();

    assert!(presence.events().is_empty());
  }
}
