//! Orchestrator tests over in-process adapters.

use std::time::Duration;

use termbridge_core::{Color, Dimensions, Error, InputEvent, Key, TerminalConfig};
use termbridge_session::{
    OutputTransform, Presentation, PumpState, Terminal, TerminalNotification, WaitCondition,
    Workload,
};

const TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_headless_feed_and_query() {
    let terminal = Terminal::headless(Dimensions::new(24, 80)).unwrap();
    terminal.feed(b"AB\x1b[31mC\x1b[0mD").await.unwrap();

    assert_eq!(terminal.cell(0, 0).unwrap().character, 'A');
    assert_eq!(terminal.cell(0, 1).unwrap().character, 'B');
    let c = terminal.cell(0, 2).unwrap();
    assert_eq!(c.character, 'C');
    assert_eq!(c.fg, Color::Red);
    let d = terminal.cell(0, 3).unwrap();
    assert_eq!(d.fg, Color::Default);
    assert!(d.attrs.is_default());
    assert_eq!(terminal.output_pump_state(), None);
}

#[tokio::test]
async fn test_feed_split_sequence() {
    let terminal = Terminal::headless(Dimensions::new(5, 20)).unwrap();
    terminal.feed(b"x\x1b[").await.unwrap();
    terminal.feed(b"2;5H").await.unwrap();
    terminal.feed(b"y").await.unwrap();
    assert_eq!(terminal.line(0).unwrap(), "x");
    assert_eq!(terminal.line(1).unwrap(), "    y");
}

#[tokio::test]
async fn test_headless_captures_injected_input() {
    let terminal = Terminal::headless(Dimensions::new(5, 20)).unwrap();
    terminal.send_key_str("Ctrl+c").await.unwrap();
    terminal.send_text("hi").await.unwrap();
    assert_eq!(
        terminal.take_captured_input(),
        vec![InputEvent::key(Key::Ctrl('c')), InputEvent::text("hi")]
    );
}

#[tokio::test]
async fn test_resize_scenario() {
    let terminal = Terminal::headless(Dimensions::new(24, 80)).unwrap();
    let mut notifications = terminal.subscribe();
    terminal.feed(b"\x1b[5;5Hin\x1b[20;70Hout").await.unwrap();

    terminal.send_resize(Dimensions::new(12, 40)).await.unwrap();
    assert_eq!(terminal.width(), 40);
    assert_eq!(terminal.height(), 12);
    assert_eq!(terminal.cell(4, 4).unwrap().character, 'i');
    assert!(terminal.cell(19, 69).is_none());
    assert_eq!(
        notifications.recv().await.unwrap(),
        TerminalNotification::Resized(Dimensions::new(12, 40))
    );
}

#[tokio::test]
async fn test_direct_workload_to_virtual_presentation() {
    let (workload, mut app) = Workload::direct();
    let (presentation, screen) = Presentation::virtual_sink(Dimensions::new(10, 40));
    let terminal = Terminal::builder()
        .workload(workload)
        .presentation(presentation)
        .build()
        .unwrap();
    assert!(screen.is_interactive());

    app.write("\x1b]2;app\x07ready").unwrap();
    app.flush().await.unwrap();
    terminal.wait_for_text("ready", TIMEOUT).await.unwrap();
    assert_eq!(terminal.title(), "app");
    assert!(screen.output_text().ends_with("ready"));

    // Input typed on the presentation reaches the application decoded.
    screen.send_input(InputEvent::key(Key::Up)).unwrap();
    let event = tokio::time::timeout(TIMEOUT, app.next_event())
        .await
        .unwrap();
    assert_eq!(event, Some(InputEvent::key(Key::Up)));

    // Presentation resizes reach both the state and the application.
    screen.resize(Dimensions::new(8, 30)).unwrap();
    let event = tokio::time::timeout(TIMEOUT, app.next_event())
        .await
        .unwrap();
    assert_eq!(
        event,
        Some(InputEvent::Resize {
            dimensions: Dimensions::new(8, 30)
        })
    );
    assert_eq!(terminal.dimensions(), Dimensions::new(8, 30));

    terminal.shutdown().await;
    assert!(!screen.is_interactive());
    assert!(terminal.contains_text("ready"));
}

#[tokio::test]
async fn test_delta_transform_renders_changes() {
    let (workload, app) = Workload::direct();
    let (presentation, screen) = Presentation::virtual_sink(Dimensions::new(4, 10));
    let terminal = Terminal::builder()
        .workload(workload)
        .presentation(presentation)
        .transform(OutputTransform::Delta)
        .build()
        .unwrap();

    app.write("\x1b[2;3Hok").unwrap();
    app.flush().await.unwrap();
    terminal.wait_for_text("ok", TIMEOUT).await.unwrap();

    let output = screen.take_output();
    let text = String::from_utf8_lossy(&output);
    // Cells are addressed directly rather than replayed.
    assert!(text.contains("\x1b[2;3H"));
    assert!(text.contains("ok"));
    // The pump claimed the dirty cells.
    assert!(terminal.take_dirty().is_empty());
}

#[tokio::test]
async fn test_workload_close_notifies_once() {
    let (workload, app) = Workload::direct();
    let terminal = Terminal::builder().workload(workload).build().unwrap();
    let mut notifications = terminal.subscribe();

    app.write("bye").unwrap();
    app.close();

    let code = terminal.wait_for_exit(TIMEOUT).await.unwrap();
    assert_eq!(code, None);
    assert_eq!(
        notifications.recv().await.unwrap(),
        TerminalNotification::WorkloadExited { exit_code: None }
    );
    assert_eq!(terminal.output_pump_state(), Some(PumpState::Stopped));
    // Last screen is preserved.
    assert!(terminal.contains_text("bye"));

    terminal.shutdown().await;
    assert!(notifications.try_recv().is_err());
}

#[tokio::test]
async fn test_null_workload_records_encoded_input() {
    let terminal = Terminal::builder()
        .workload(Workload::null())
        .build()
        .unwrap();
    terminal.send_text("ls").await.unwrap();
    terminal.send_key(Key::Enter).await.unwrap();
    terminal.send_paste("x").await.unwrap();
    assert_eq!(terminal.workload().unwrap().captured_input().unwrap(), b"ls\rx");
}

#[tokio::test]
async fn test_device_query_answered_on_stream() {
    let (local, mut remote) = tokio::io::duplex(256);
    let (reader, writer) = tokio::io::split(local);
    let terminal = Terminal::builder()
        .workload(Workload::stream(reader, writer))
        .answer_queries(true)
        .build()
        .unwrap();

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    remote.write_all(b"\x1b[3;4H\x1b[6n").await.unwrap();
    let mut reply = [0u8; 6];
    tokio::time::timeout(TIMEOUT, remote.read_exact(&mut reply))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&reply, b"\x1b[3;4R");
    terminal.shutdown().await;
}

#[tokio::test]
async fn test_waits_time_out() {
    let terminal = Terminal::headless(Dimensions::new(5, 20)).unwrap();
    let result = terminal
        .wait_for_text("never", Duration::from_millis(150))
        .await;
    assert!(matches!(result, Err(Error::WaitTimeout(150))));

    let condition = WaitCondition::for_text("nev(er")
        .with_timeout(Duration::from_millis(50));
    assert!(matches!(
        terminal.wait_for(&condition).await,
        Err(Error::InvalidInput(_))
    ));

    assert!(matches!(
        terminal.wait_for_exit(Duration::from_millis(10)).await,
        Err(Error::NotAttached(_))
    ));
}

#[tokio::test]
async fn test_wait_for_idle_and_gone() {
    let terminal = Terminal::headless(Dimensions::new(5, 20)).unwrap();
    terminal.feed(b"loading").await.unwrap();
    terminal.wait_for_idle(TIMEOUT).await.unwrap();

    terminal.feed(b"\x1b[2J\x1b[Hdone").await.unwrap();
    let condition = WaitCondition::for_text_gone("loading")
        .with_timeout(TIMEOUT)
        .with_poll_interval(Duration::from_millis(10));
    let result = terminal.wait_for(&condition).await.unwrap();
    assert!(result.condition_met);
    assert_eq!(result.snapshot.lines[0], "done");
}

#[tokio::test]
async fn test_rejects_bad_configuration() {
    let mut config = TerminalConfig::default();
    config.terminal.default_rows = 0;
    assert!(Terminal::builder().config(config).build().is_err());

    let (workload, _app) = Workload::direct();
    let both = Terminal::builder()
        .workload(workload)
        .spawn(termbridge_core::SpawnConfig::new("/bin/true"))
        .build();
    assert!(matches!(both, Err(Error::InvalidInput(_))));
}
