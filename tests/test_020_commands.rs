
use driveline::{
    Client, DrivelineResult, RecordId, StoreOptions,
};
use flexi_logger::LoggerHandle;
use log::*;
use std::time::{Duration, Instant};
use test_utils::{array, bytes, text, uint, MockServer, UNDEFINED};

#[tokio::test]
async fn test_020_commands() -> DrivelineResult<()> {
    let mut log_handle = test_utils::init_logger();
    let start = Instant::now();
    append_bytes_on_the_wire(&mut log_handle).await?;
    store_bytes_on_the_wire(&mut log_handle).await?;
    remove_and_truncate_bytes_on_the_wire(&mut log_handle).await?;
    stream_handles_use_aliases(&mut log_handle).await?;
    alias_exhaustion_falls_back_to_names(&mut log_handle).await?;
    info!("Elapsed time: {:?}", Instant::now().duration_since(start));
    Ok(())
}

async fn append_bytes_on_the_wire(_log_handle: &mut LoggerHandle) -> DrivelineResult<()> {
    info!("test the append wire format");
    let server = MockServer::start().await;
    let client = Client::new(server.url()).await?;

    client.append("sensors", b"data").await?;

    let mut expected = array(4);
    expected.extend(text("app"));
    expected.extend(text("sensors"));
    expected.push(UNDEFINED);
    expected.extend(bytes(b"data"));
    let (_, frame) = server.wait_for_frame(|_, f| f == expected).await;
    assert_eq!(frame, expected);
    client.close();
    Ok(())
}

async fn store_bytes_on_the_wire(_log_handle: &mut LoggerHandle) -> DrivelineResult<()> {
    info!("test the store wire format, with and without options");
    let server = MockServer::start().await;
    let client = Client::new(server.url()).await?;

    client.store("config", b"v1").await?;
    let mut expected = array(4);
    expected.extend(text("st"));
    expected.extend(text("config"));
    expected.push(UNDEFINED);
    expected.extend(bytes(b"v1"));
    server.wait_for_frame(|_, f| f == expected).await;

    let cas = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
    let options = StoreOptions::new()
        .compare_and_swap(RecordId::from(&cas[..]))
        .with_ttl(Duration::from_secs(2));
    client.store_with_options("config", b"v2", &options).await?;

    let mut expected = array(4);
    expected.extend(text("st"));
    expected.extend(text("config"));
    expected.extend(array(4));
    expected.extend(uint(3));
    expected.extend(bytes(&cas));
    expected.extend(uint(4));
    expected.extend(uint(2000));
    expected.extend(bytes(b"v2"));
    server.wait_for_frame(|_, f| f == expected).await;
    client.close();
    Ok(())
}

async fn remove_and_truncate_bytes_on_the_wire(
    _log_handle: &mut LoggerHandle,
) -> DrivelineResult<()> {
    info!("test remove, remove_matches, and truncate wire formats");
    let server = MockServer::start().await;
    let client = Client::new(server.url()).await?;

    client.remove("config").await?;
    let mut expected = array(3);
    expected.extend(text("rm"));
    expected.push(UNDEFINED);
    expected.extend(text("config"));
    server.wait_for_frame(|_, f| f == expected).await;

    client.remove_matches("config/*").await?;
    let mut expected = array(3);
    expected.extend(text("rmk"));
    expected.push(UNDEFINED);
    expected.extend(text("config/*"));
    server.wait_for_frame(|_, f| f == expected).await;

    client.truncate("sensors").await?;
    let mut expected = array(3);
    expected.extend(text("trc"));
    expected.push(UNDEFINED);
    expected.extend(text("sensors"));
    server.wait_for_frame(|_, f| f == expected).await;
    client.close();
    Ok(())
}

async fn stream_handles_use_aliases(_log_handle: &mut LoggerHandle) -> DrivelineResult<()> {
    info!("test that a stream handle defines and uses a one-byte alias");
    let server = MockServer::start().await;
    let client = Client::new(server.url()).await?;

    let stream = client.open_stream("sensors").await?;
    let mut expected_define = array(3);
    expected_define.extend(text("def"));
    expected_define.extend(uint(0));
    expected_define.extend(text("sensors"));
    server.wait_for_frame(|_, f| f == expected_define).await;

    stream.append(b"reading").await?;
    let mut expected_append = array(4);
    expected_append.extend(text("app"));
    expected_append.extend(uint(0));
    expected_append.push(UNDEFINED);
    expected_append.extend(bytes(b"reading"));
    server.wait_for_frame(|_, f| f == expected_append).await;

    stream.truncate().await?;
    let mut expected_truncate = array(3);
    expected_truncate.extend(text("trc"));
    expected_truncate.push(UNDEFINED);
    expected_truncate.extend(uint(0));
    server.wait_for_frame(|_, f| f == expected_truncate).await;

    // releasing the handle frees the alias for the next stream
    client.close_stream(stream);
    let reused = client.open_stream("other").await?;
    let mut expected_define = array(3);
    expected_define.extend(text("def"));
    expected_define.extend(uint(0));
    expected_define.extend(text("other"));
    server.wait_for_frame(|_, f| f == expected_define).await;
    drop(reused);
    client.close();
    Ok(())
}

async fn alias_exhaustion_falls_back_to_names(
    _log_handle: &mut LoggerHandle,
) -> DrivelineResult<()> {
    info!("test that stream 257 falls back to by-name commands");
    let server = MockServer::start().await;
    let client = Client::new(server.url()).await?;

    let mut streams = Vec::new();
    for i in 0..256 {
        streams.push(client.open_stream(&format!("s{i}")).await?);
    }
    let overflow = client.open_stream("overflow").await?;
    overflow.append(b"x").await?;

    let mut expected = array(4);
    expected.extend(text("app"));
    expected.extend(text("overflow"));
    expected.push(UNDEFINED);
    expected.extend(bytes(b"x"));
    server.wait_for_frame(|_, f| f == expected).await;
    client.close();
    Ok(())
}
