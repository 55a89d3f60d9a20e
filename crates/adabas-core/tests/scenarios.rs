//! End-to-end scenarios through the call engine and the ADATCP driver.

mod common;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use adabas_core::abd::{Buffer, BufferId};
use adabas_core::acbx::{Acbx, CommandCode};
use adabas_core::driver::TransportDriver;
use adabas_core::field::NodeKind;
use adabas_core::{AdaId, AdaTcp, CallEngine, ClientConfig, NullLogger, SessionId, Url};

use common::{employee_handler, fill, start, FakeDatabase};

fn engine(db: &FakeDatabase) -> CallEngine {
    let session = Arc::new(SessionId::with_logger(
        AdaId::with_names("scenario", "host"),
        Arc::new(NullLogger),
    ));
    CallEngine::new(session, db.url.clone(), ClientConfig::default())
}

#[tokio::test]
async fn test_command_validation() {
    assert!(CommandCode::parse("S4").is_valid());
    assert!(CommandCode::parse("s4").is_valid());
    assert!(!CommandCode::parse("X1").is_valid());

    let db = start(employee_handler()).await;
    let engine = engine(&db);
    let mut acbx = engine.acbx();
    acbx.command = CommandCode::parse("X1");
    let err = engine.call(&mut acbx, &mut []).await.unwrap_err();
    assert_eq!(err.code(), 2);
    assert!(db.commands().is_empty());
}

#[test]
fn test_acbx_display_after_reset() {
    let mut acbx = Acbx::new(1);
    acbx.response = 0;
    acbx.reset();
    acbx.cid = *b"ABxn";
    acbx.options = [b'I', b'J', 0, 0, 0, 0, 0xff, 0x01];
    acbx.isn = 1_234_543;
    assert!(acbx.to_string().contains("Responsecode: 148 Subcode: 0"));
    acbx.response = 200;
    assert!(acbx.to_string().contains("Responsecode: 200"));
}

#[test]
fn test_buffer_sizing() {
    let mut record = Buffer::with_size(BufferId::Record, 100);
    assert_eq!(record.size(), 100);
    record.grow(150);
    assert_eq!(record.size(), 150);
    record.extend(50);
    assert_eq!(record.size(), 200);
    record.position(5);
    assert_eq!(record.offset(), 5);
}

#[tokio::test]
async fn test_unreachable_host_then_disconnect() {
    common::init_tracing();
    let url = Url::parse("12(adatcp://invalid-host.invalid:12345)").unwrap();
    let mut config = ClientConfig::default();
    config.tcp.connect_timeout_ms = 2000;
    let mut driver = AdaTcp::new(
        url,
        AdaId::with_names("scenario", "host"),
        config,
        Arc::new(NullLogger),
    )
    .unwrap();
    assert!(driver.connect(&Acbx::new(12)).await.is_err());
    assert!(!driver.is_connected());
    assert_eq!(driver.disconnect().await.unwrap_err().code(), 114);
}

#[cfg(target_endian = "little")]
#[tokio::test]
async fn test_read_employee_definition() {
    common::init_tracing();
    let db = start(employee_handler()).await;
    let engine = engine(&db);
    let definition = engine.read_fdt(11).await.unwrap();
    assert_eq!(db.commands(), vec!["OP", "LF"]);
    assert!(engine.session().is_open(engine.url()).await);

    match &definition.search("PH").map(|n| &n.kind) {
        Some(NodeKind::Phonetic(p)) => {
            assert_eq!(p.parent, "AE");
            assert_eq!(p.length, 20);
        }
        other => panic!("PH is {:?}", other),
    }
    assert!(definition.search("H1").is_some());
    assert!(definition.search("CN").is_some());
    let text = definition.to_string();
    assert!(text.contains("CN,HE=COLLATING(BC,'de@collation=phonebook',PRIMARY) ; CN"));
    assert!(text.contains("HO=REFINT(AC,12,AA/DX,UX) ; HO"));

    // a second read reuses the open session
    engine.read_fdt(11).await.unwrap();
    assert_eq!(db.commands(), vec!["OP", "LF", "LF"]);
}

#[tokio::test]
async fn test_record_buffer_grows_on_response_53() {
    let answers = Arc::new(Mutex::new(VecDeque::from([53u16, 53, 0])));
    let handler_answers = answers.clone();
    let db = start(Arc::new(move |acbx: &mut Acbx, buffers: &mut [Buffer]| {
        acbx.response = handler_answers.lock().unwrap().pop_front().unwrap_or(0);
        if acbx.response == 0 {
            if let Some(record) = buffers.iter_mut().find(|b| b.id() == b'R') {
                fill(record, b"RECORD");
            }
        }
    }))
    .await;
    let engine = engine(&db);

    let mut acbx = engine.acbx();
    acbx.command = CommandCode::L1;
    acbx.file = 11;
    acbx.isn = 1;
    let mut format = Buffer::new(BufferId::Format);
    format.write_string("AA.");
    let mut buffers = vec![format, Buffer::with_size(BufferId::Record, 100)];
    engine.call(&mut acbx, &mut buffers).await.unwrap();

    assert_eq!(acbx.response, 0);
    assert_eq!(buffers[1].size(), 100 + 2 * 8192);
    assert_eq!(buffers[1].received_bytes(), b"RECORD");
    let sizes: Vec<u64> = db
        .calls
        .lock()
        .unwrap()
        .iter()
        .map(|c| c.sizes[1])
        .collect();
    assert_eq!(sizes, vec![100, 100 + 8192, 100 + 16384]);
}

#[tokio::test]
async fn test_database_error_carries_response() {
    let db = start(Arc::new(|acbx: &mut Acbx, _: &mut [Buffer]| {
        acbx.response = 17;
    }))
    .await;
    let engine = engine(&db);
    let mut acbx = engine.acbx();
    acbx.command = CommandCode::L1;
    let err = engine.call(&mut acbx, &mut []).await.unwrap_err();
    assert_eq!(err.code(), 17);
    assert_eq!(err.response(), Some(17));
    assert!(err.to_string().contains("ADAGE11000"));
}

#[tokio::test]
async fn test_transaction_lifecycle() {
    let db = start(employee_handler()).await;
    let engine = engine(&db);
    engine.open().await.unwrap();
    let url = engine.url().clone();
    assert_eq!(
        engine.session().platform(&url).await.map(|p| p.architecture()),
        Some(0x21)
    );

    let mut acbx = engine.acbx();
    acbx.command = CommandCode::N1;
    acbx.file = 11;
    engine.call(&mut acbx, &mut []).await.unwrap();
    assert_eq!(engine.session().transactions(&url).await, 1);
    engine.end_transaction().await.unwrap();
    assert_eq!(engine.session().transactions(&url).await, 0);

    let mut acbx = engine.acbx();
    acbx.command = CommandCode::A1;
    engine.call(&mut acbx, &mut []).await.unwrap();
    engine.close().await.unwrap();
    assert!(!engine.session().is_open(&url).await);
    assert_eq!(db.commands(), vec!["OP", "N1", "ET", "A1", "BT", "CL"]);
}

#[tokio::test]
async fn test_session_close_backs_out_open_transactions() {
    let db = start(employee_handler()).await;
    let engine = engine(&db);
    engine.open().await.unwrap();
    let mut acbx = engine.acbx();
    acbx.command = CommandCode::N1;
    acbx.file = 11;
    engine.call(&mut acbx, &mut []).await.unwrap();

    engine.session().close().await;
    assert_eq!(db.commands(), vec!["OP", "N1", "BT", "CL"]);
    assert!(!engine.session().is_open(engine.url()).await);
    assert_eq!(engine.session().transactions(engine.url()).await, 0);
}
