
use driveline::{Client, ConnectionConfiguration, DrivelineError, DrivelineResult, Record};
use flexi_logger::LoggerHandle;
use log::*;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use test_utils::{array, bytes, data_reply, text, uint, MockServer};
use tokio_util::sync::CancellationToken;

fn fast_reconnect_config() -> ConnectionConfiguration {
    ConnectionConfiguration::default().with_reconnect_wait(Duration::from_millis(10))
}

#[tokio::test]
async fn test_050_reconnect() -> DrivelineResult<()> {
    let mut log_handle = test_utils::init_logger();
    let start = Instant::now();
    aliases_and_continuous_queries_are_replayed(&mut log_handle).await?;
    load_is_resubmitted(&mut log_handle).await?;
    list_fails_on_disconnect(&mut log_handle).await?;
    reconnect_exhaustion_fails_pending_operations(&mut log_handle).await?;
    info!("Elapsed time: {:?}", Instant::now().duration_since(start));
    Ok(())
}

async fn aliases_and_continuous_queries_are_replayed(
    _log_handle: &mut LoggerHandle,
) -> DrivelineResult<()> {
    info!("test that a reconnect replays defines, then re-submits the query");
    let server = MockServer::start().await;
    server.set_responder(|connection_id, frame| {
        // the first connection delivers one record, later ones stay quiet
        if connection_id == 1 && test_utils::is_command(frame, "sq") {
            vec![data_reply(0, &[(&[0x2A], b"live")])]
        } else {
            Vec::new()
        }
    });

    let client = Client::with_configuration(server.url(), &fast_reconnect_config()).await?;
    let stream = client.open_stream("sensors").await?;

    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel::<Record>();
    let query_client = client.clone();
    let query_cancel = cancel.clone();
    let pending = tokio::spawn(async move {
        query_client
            .continuous_query(&query_cancel, "SELECT * FROM sensors", move |record| {
                let _ = tx.send(record);
            })
            .await
    });

    // the first connection saw the define and the query, and delivered one record
    server
        .wait_for_frame(|c, f| c == 1 && test_utils::is_command(f, "sq"))
        .await;
    let record = tokio::task::spawn_blocking(move || rx.recv().unwrap())
        .await
        .unwrap();
    assert_eq!(record.payload, b"live");

    server.drop_connections();

    // after the reconnect: the alias is re-defined in insertion order, and
    // the query is re-submitted starting past the delivered record
    let mut expected_define = array(3);
    expected_define.extend(text("def"));
    expected_define.extend(uint(0));
    expected_define.extend(text("sensors"));
    server.wait_for_frame(|c, f| c == 2 && f == expected_define).await;

    let mut expected_query = array(4);
    expected_query.extend(text("sq"));
    expected_query.extend(uint(0));
    expected_query.extend(array(2));
    expected_query.extend(uint(2));
    expected_query.extend(bytes(&[0x2A]));
    expected_query.extend(text("SELECT * FROM sensors"));
    server.wait_for_frame(|c, f| c == 2 && f == expected_query).await;

    let frames = server.frames();
    let define_position = frames
        .iter()
        .position(|(c, f)| *c == 2 && *f == expected_define)
        .unwrap();
    let query_position = frames
        .iter()
        .position(|(c, f)| *c == 2 && *f == expected_query)
        .unwrap();
    assert!(define_position < query_position, "defines replay first");

    cancel.cancel();
    let result = pending.await.unwrap();
    assert!(matches!(result, Err(DrivelineError::Cancelled)));
    drop(stream);
    client.close();
    Ok(())
}

async fn load_is_resubmitted(_log_handle: &mut LoggerHandle) -> DrivelineResult<()> {
    info!("test that an in-flight load is re-submitted and completes");
    let server = MockServer::start().await;
    server.set_responder(|connection_id, frame| {
        // the first connection swallows the load
        if connection_id > 1 && test_utils::is_command(frame, "ld") {
            vec![data_reply(0, &[(&[0x07], b"late-value")])]
        } else {
            Vec::new()
        }
    });

    let client = Client::with_configuration(server.url(), &fast_reconnect_config()).await?;
    let load_client = client.clone();
    let pending = tokio::spawn(async move {
        load_client.load(&CancellationToken::new(), "config").await
    });

    server
        .wait_for_frame(|c, f| c == 1 && test_utils::is_command(f, "ld"))
        .await;
    server.drop_connections();
    server
        .wait_for_frame(|c, f| c == 2 && test_utils::is_command(f, "ld"))
        .await;

    let record = pending.await.unwrap()?;
    assert_eq!(record.payload, b"late-value");
    client.close();
    Ok(())
}

async fn list_fails_on_disconnect(_log_handle: &mut LoggerHandle) -> DrivelineResult<()> {
    info!("test that a disconnect is terminal for a list");
    let server = MockServer::start().await;

    let client = Client::with_configuration(server.url(), &fast_reconnect_config()).await?;
    let list_client = client.clone();
    let pending = tokio::spawn(async move {
        list_client
            .list_streams(&CancellationToken::new(), "*", |_| {})
            .await
    });

    server
        .wait_for_frame(|_, f| test_utils::is_command(f, "sls"))
        .await;
    server.drop_connections();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(DrivelineError::Closed)));
    client.close();
    Ok(())
}

async fn reconnect_exhaustion_fails_pending_operations(
    _log_handle: &mut LoggerHandle,
) -> DrivelineResult<()> {
    info!("test that exhausting the reconnect budget fans out MaxReconnect");
    let server = MockServer::start().await;
    let config = fast_reconnect_config().with_max_reconnect(2);

    let client = Client::with_configuration(server.url(), &config).await?;
    let query_client = client.clone();
    let pending = tokio::spawn(async move {
        query_client
            .continuous_query(&CancellationToken::new(), "SELECT * FROM s", |_| {})
            .await
    });
    server
        .wait_for_frame(|_, f| test_utils::is_command(f, "sq"))
        .await;

    server.stop_accepting();
    server.drop_connections();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(DrivelineError::MaxReconnect)));

    // the session is terminal, fire-and-forget writes now fail at the queue
    let append_result = client.append("s", b"x").await;
    assert!(matches!(append_result, Err(DrivelineError::Closed)));
    Ok(())
}
