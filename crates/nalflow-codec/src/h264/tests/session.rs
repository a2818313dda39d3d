use nalflow_core::PixelFormat;

use super::super::{FormatChange, SessionManager, SessionState, SubmitOutcome};
use crate::error::{BackendStatus, DecodeError};
use crate::parsers::h264::nal_payload;
use crate::sink::{DecodeEvent, DecodeSink};

use super::helpers::*;

fn manager(backend: RecordingBackend) -> (SessionManager<RecordingBackend>, std::sync::mpsc::Receiver<DecodeEvent>) {
    let (sink, rx) = DecodeSink::channel();
    (SessionManager::new(backend, PixelFormat::Gray8, sink), rx)
}

fn update(mgr: &mut SessionManager<RecordingBackend>, sps: &[u8]) -> Result<FormatChange, DecodeError> {
    mgr.update_format(nal_payload(sps), nal_payload(PPS))
}

#[test]
fn test_submit_without_descriptor_is_dropped() {
    let (mut mgr, rx) = manager(RecordingBackend::default());
    assert_eq!(mgr.state(), SessionState::NoSession);
    assert_eq!(mgr.submit(IDR).unwrap(), SubmitOutcome::Dropped);
    assert_eq!(mgr.stats().frames_dropped, 1);
    assert!(mgr.backend().submitted.is_empty());
    assert!(rx.try_recv().is_err(), "静默丢弃不应上报错误");
}

#[test]
fn test_first_descriptor_creates_session() {
    let (mut mgr, rx) = manager(RecordingBackend::default());
    assert_eq!(update(&mut mgr, SPS_64X48).unwrap(), FormatChange::SessionCreated);
    assert_eq!(mgr.state(), SessionState::Active);
    assert_eq!(mgr.descriptor().map(|d| d.width()), Some(64));

    assert_eq!(mgr.submit(IDR).unwrap(), SubmitOutcome::Submitted);
    assert_eq!(mgr.backend().submitted, vec![vec![0, 0, 0, 5, 0x65, 0x88, 0x84, 0x00, 0x33]]);
    assert!(matches!(rx.try_recv().unwrap(), DecodeEvent::Frame(_)));
}

#[test]
fn test_compatible_descriptor_reuses_session() {
    let (mut mgr, _rx) = manager(RecordingBackend::default());
    update(&mut mgr, SPS_64X48).unwrap();
    assert_eq!(update(&mut mgr, SPS_64X48_L31).unwrap(), FormatChange::SessionReused);

    let backend = mgr.backend();
    assert_eq!(backend.descriptors_built, 2);
    assert_eq!(backend.sessions_created, 1);
    assert_eq!(backend.sessions_invalidated, 0);
    assert_eq!(mgr.descriptor().unwrap().geometry().level_idc, 0x1F);
    assert_eq!(mgr.stats().sessions_reused, 1);
}

#[test]
fn test_incompatible_descriptor_recreates_session() {
    let (mut mgr, _rx) = manager(RecordingBackend::default());
    update(&mut mgr, SPS_64X48).unwrap();
    assert_eq!(update(&mut mgr, SPS_32X32).unwrap(), FormatChange::SessionRecreated);
    assert_eq!(update(&mut mgr, SPS_64X48).unwrap(), FormatChange::SessionRecreated);

    let backend = mgr.backend();
    assert_eq!(backend.sessions_created, 3);
    assert_eq!(backend.sessions_invalidated, 2);
    assert_eq!(backend.max_live_sessions, 1, "任意时刻最多一个存活会话");
    assert_eq!(backend.live_sessions, 1);
}

#[test]
fn test_descriptor_failure_keeps_previous_descriptor() {
    let (mut mgr, _rx) = manager(RecordingBackend::default());
    update(&mut mgr, SPS_64X48).unwrap();
    mgr.backend_mut().reject_descriptors = true;

    let err = update(&mut mgr, SPS_32X32).unwrap_err();
    assert_eq!(
        err,
        DecodeError::DescriptorBuild {
            status: BackendStatus::INVALID_PARAMETER_SET
        }
    );
    assert_eq!(mgr.state(), SessionState::Active);
    assert_eq!(mgr.descriptor().unwrap().width(), 64);
    assert_eq!(mgr.submit(IDR).unwrap(), SubmitOutcome::Submitted);
}

#[test]
fn test_session_create_failure_drops_frames_until_recovery() {
    let backend = RecordingBackend {
        fail_create: Some(BackendStatus::UNSUPPORTED_FORMAT),
        ..Default::default()
    };
    let (mut mgr, _rx) = manager(backend);
    let err = update(&mut mgr, SPS_64X48).unwrap_err();
    assert_eq!(
        err,
        DecodeError::SessionCreate {
            status: BackendStatus::UNSUPPORTED_FORMAT
        }
    );
    assert_eq!(mgr.state(), SessionState::NoSession);
    assert!(mgr.descriptor().is_some());
    assert_eq!(mgr.submit(IDR).unwrap(), SubmitOutcome::Dropped);

    mgr.backend_mut().fail_create = None;
    assert_eq!(update(&mut mgr, SPS_32X32).unwrap(), FormatChange::SessionCreated);
    assert_eq!(mgr.submit(IDR).unwrap(), SubmitOutcome::Submitted);
}

#[test]
fn test_submission_rejection_is_reported() {
    let (mut mgr, _rx) = manager(RecordingBackend::default());
    update(&mut mgr, SPS_64X48).unwrap();
    mgr.backend_mut().fail_submit = Some(BackendStatus::SESSION_UNAVAILABLE);
    assert_eq!(
        mgr.submit(IDR).unwrap_err(),
        DecodeError::DecodeSubmission {
            status: BackendStatus::SESSION_UNAVAILABLE
        }
    );

    mgr.backend_mut().fail_submit = None;
    assert_eq!(mgr.submit(SLICE).unwrap(), SubmitOutcome::Submitted);
}

#[test]
fn test_packaging_failure_is_reported() {
    let (mut mgr, _rx) = manager(RecordingBackend::default());
    update(&mut mgr, SPS_64X48).unwrap();
    assert!(matches!(
        mgr.submit(&[0, 0, 0, 1]),
        Err(DecodeError::FramePackaging { .. })
    ));
}

#[test]
fn test_close_invalidates_and_allows_restart() {
    let (mut mgr, _rx) = manager(RecordingBackend::default());
    update(&mut mgr, SPS_64X48).unwrap();
    mgr.close();
    assert_eq!(mgr.state(), SessionState::Invalid);
    assert_eq!(mgr.backend().live_sessions, 0);
    assert_eq!(mgr.submit(IDR).unwrap(), SubmitOutcome::Dropped);

    assert_eq!(update(&mut mgr, SPS_32X32).unwrap(), FormatChange::SessionCreated);
    assert_eq!(mgr.state(), SessionState::Active);
    let stats = mgr.stats();
    assert_eq!(stats.sessions_created, 2);
    assert_eq!(stats.sessions_invalidated, 1);
}
