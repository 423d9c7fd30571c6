//! Cross-thread cancellation of presence waits

mod common;

use std::{
    thread,
    time::{Duration, Instant},
};

use common::{CONTACTLESS_READER, ScriptedTerminal, session};
use nexum_apdu_core::{Error, TransportError};
use nexum_apdu_transport_pcsc::{POLLING_LATENCY, PresencePoller};

#[test]
fn test_removal_wait_cancelled_from_another_thread() {
    let (started_tx, started_rx) = crossbeam_channel::bounded(1);
    let mut terminal = ScriptedTerminal::new(CONTACTLESS_READER);
    terminal.wait_started = Some(started_tx);

    let mut reader = session(terminal);
    let canceller = reader.removal_canceller();

    let worker = thread::spawn(move || {
        let result = reader.wait_for_card_removal();
        (reader, result)
    });

    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    let cancelled_at = Instant::now();
    canceller.cancel();

    let (_reader, result) = worker.join().unwrap();
    assert!(result.unwrap_err().is_cancelled());
    assert!(cancelled_at.elapsed() <= POLLING_LATENCY + Duration::from_millis(250));
}

#[test]
fn test_insertion_and_removal_are_independent() {
    let terminal = ScriptedTerminal::new(CONTACTLESS_READER).with_presence(&[false, true]);
    let mut reader = session(terminal);

    // stopping the removal wait must not affect an insertion wait
    reader.stop_wait_for_card_removal();
    reader.wait_for_card_insertion().unwrap();
}

#[test]
fn test_insertion_wait_cancelled_before_next_iteration() {
    let (started_tx, started_rx) = crossbeam_channel::unbounded();
    let mut terminal = ScriptedTerminal::new(CONTACTLESS_READER);
    terminal.wait_started = Some(started_tx);

    let mut reader = session(terminal);
    let canceller = reader.insertion_canceller();
    let worker = thread::spawn(move || reader.wait_for_card_insertion());

    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    canceller.cancel();

    let err = worker.join().unwrap().unwrap_err();
    assert!(matches!(err, Error::TaskCancelled(message) if message.contains("card insertion")));
    assert!(started_rx.try_iter().count() <= 1);
}

#[test]
fn test_wait_failure_is_reader_io() {
    let mut terminal = ScriptedTerminal::new(CONTACTLESS_READER);
    terminal
        .presence
        .push_back(Err(TransportError::native("SCARD_E_NO_SERVICE")));
    let mut reader = session(terminal);

    assert!(matches!(
        reader.wait_for_card_removal(),
        Err(Error::ReaderIo { .. })
    ));
}
