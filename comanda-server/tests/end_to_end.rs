//! Full loop: offline device -> queue -> drain -> ledger -> pull

use std::net::SocketAddr;
use std::time::Duration;

use comanda_client::{ApiClient, BootstrapSync, ClientConfig, MirrorStore, PendingQueue, SyncEngine};
use comanda_server::core::{Config, ServerState};
use futures::StreamExt;
use shared::event::{ChangeEvent, ChangeEventKind};
use shared::models::{ItemState, Order, OrderItem, OrderState};
use shared::util::{new_id, now_millis};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

const TENANT: &str = "demo";

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Open the realtime channel against a spawned server
async fn connect_events(base_url: &str) -> WsStream {
    let ws_url = format!("ws{}/api/events", base_url.trim_start_matches("http"));
    let (socket, _) = connect_async(&ws_url).await.unwrap();
    socket
}

/// Next text frame on the channel, decoded
async fn next_event(socket: &mut WsStream) -> ChangeEvent {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for an event")
            .expect("event stream ended")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("malformed event frame");
        }
    }
}

/// Boot a server on an ephemeral port, returning its base URL
async fn spawn_server() -> (String, ServerState) {
    let config = Config::with_overrides("/tmp/unused", 0);
    let state = ServerState::initialize_in_memory(&config).await.unwrap();

    let app = comanda_server::api::build_app().with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (format!("http://{addr}"), state)
}

fn device(base_url: &str) -> (SyncEngine, BootstrapSync) {
    let config = ClientConfig::new(base_url, TENANT);
    let api = ApiClient::new(&config).unwrap();
    let mirror = MirrorStore::open_in_memory().unwrap();
    let queue = PendingQueue::open_in_memory().unwrap();
    let engine = SyncEngine::new(api.clone(), queue, mirror.clone(), config.max_retries);
    let bootstrap = BootstrapSync::new(api, mirror);
    (engine, bootstrap)
}

fn draft_order(table: &str) -> Order {
    let id = new_id();
    let ts = now_millis();
    Order {
        id: id.clone(),
        tenant_id: TENANT.into(),
        waiter_id: "waiter-1".into(),
        ticket_number: 0,
        table_label: Some(table.into()),
        state: OrderState::Pending,
        subtotal_cents: 0,
        total_cents: 0,
        notes: None,
        billing_info: None,
        created_at: ts,
        updated_at: ts,
        version: 0,
        synchronized: false,
        items: vec![OrderItem {
            id: new_id(),
            order_id: id,
            menu_entry_id: "menu-espresso".into(),
            name: "Espresso".into(),
            category: "drinks".into(),
            quantity: 2,
            unit_price_cents: 150,
            subtotal_cents: 300,
            state: ItemState::Pending,
            instructions: None,
        }],
    }
}

#[tokio::test]
async fn offline_queue_drains_into_dense_tickets() {
    let (base_url, _state) = spawn_server().await;
    let (engine, bootstrap) = device(&base_url);

    // device starts offline; both orders stay local
    let first = draft_order("T1");
    let second = draft_order("T2");
    engine.create_order(&first).await.unwrap();
    engine.create_order(&second).await.unwrap();

    assert_eq!(engine.queue().len().unwrap(), 2);
    let mirrored = engine.mirror().get_order(&first.id).unwrap().unwrap();
    assert!(!mirrored.synchronized);

    // connectivity returns
    let report = engine.set_online(true).await.unwrap();
    assert_eq!(report.sent, 2);
    assert_eq!(report.acked, 2);
    assert_eq!(report.failed, 0);
    assert!(engine.queue().is_empty().unwrap());

    // server assigned dense tickets in submission order
    let mirrored = engine.mirror().get_order(&first.id).unwrap().unwrap();
    assert!(mirrored.synchronized);

    // pull the authoritative copies back
    assert!(bootstrap.reconcile().await.unwrap());
    let active = engine.mirror().list_active_orders().unwrap();
    assert_eq!(active.len(), 2);
    assert_eq!(active[0].ticket_number, 1);
    assert_eq!(active[1].ticket_number, 2);
    assert_eq!(active[0].total_cents, 300);
}

#[tokio::test]
async fn resubmitted_queue_mints_no_duplicate_tickets() {
    let (base_url, state) = spawn_server().await;
    let (engine, _) = device(&base_url);

    let order = draft_order("T1");
    engine.create_order(&order).await.unwrap();
    engine.set_online(true).await.unwrap();

    // the device resubmits the same order id (lost ack simulation)
    let (engine2, _) = device(&base_url);
    engine2.create_order(&order).await.unwrap();
    engine2.set_online(true).await.unwrap();

    let stored = state.ledger.get_order(&order.id).await.unwrap();
    assert_eq!(stored.ticket_number, 1);
    assert_eq!(
        state.ledger.list_active_orders(TENANT).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn day_close_over_http() {
    let (base_url, _state) = spawn_server().await;
    let (engine, _) = device(&base_url);

    engine.create_order(&draft_order("T1")).await.unwrap();
    engine.create_order(&draft_order("T2")).await.unwrap();
    engine.set_online(true).await.unwrap();

    let config = ClientConfig::new(&base_url, TENANT);
    let api = ApiClient::new(&config).unwrap();
    let closed = api.close_day().await.unwrap();

    assert_eq!(closed.total_orders, 2);
    assert_eq!(closed.total_revenue_cents, 600);
    assert!(api.fetch_active_orders().await.unwrap().is_empty());

    // closing twice fails cleanly
    let err = api.close_day().await.unwrap_err();
    assert!(matches!(err, comanda_client::ClientError::Server { .. }));
}

#[tokio::test]
async fn offline_submit_survives_server_absence() {
    // no server at all
    let (engine, _) = device("http://127.0.0.1:9");

    let order = draft_order("T1");
    engine.create_order(&order).await.unwrap();

    // drain attempt fails but the queue is intact, with the attempt counted
    assert!(engine.set_online(true).await.is_err());
    assert!(!engine.is_online());
    assert_eq!(engine.queue().len().unwrap(), 1);
    let pending = engine.queue().unprocessed(10).unwrap();
    assert_eq!(pending[0].1.retries, 1);
    assert!(engine.mirror().get_order(&order.id).unwrap().is_some());
}

#[tokio::test]
async fn realtime_events_converge_a_listening_mirror() {
    let (base_url, _state) = spawn_server().await;
    let mut socket = connect_events(&base_url).await;

    let config = ClientConfig::new(&base_url, TENANT);
    let api = ApiClient::new(&config).unwrap();
    let created = api.create_order(&draft_order("T1")).await.unwrap();

    let event = next_event(&mut socket).await;
    assert_eq!(event.event, ChangeEventKind::OrderNew);
    assert_eq!(event.entity_id, created.id);
    assert_eq!(event.tenant_id, TENANT);

    // applying the frame yields the server's copy, ticket included
    let mirror = MirrorStore::open_in_memory().unwrap();
    mirror.apply_change(&event).unwrap();
    let local = mirror.get_order(&created.id).unwrap().unwrap();
    assert_eq!(local.ticket_number, created.ticket_number);
    assert_eq!(local.total_cents, created.total_cents);
}

#[tokio::test]
async fn day_close_event_settles_a_converged_mirror() {
    let (base_url, _state) = spawn_server().await;
    let mut socket = connect_events(&base_url).await;

    let config = ClientConfig::new(&base_url, TENANT);
    let api = ApiClient::new(&config).unwrap();
    let mirror = MirrorStore::open_in_memory().unwrap();

    // mirror converges on the open order via the realtime channel
    let created = api.create_order(&draft_order("T1")).await.unwrap();
    mirror.apply_change(&next_event(&mut socket).await).unwrap();
    let local = mirror.get_order(&created.id).unwrap().unwrap();
    assert_eq!(local.state, OrderState::Pending);

    api.close_day().await.unwrap();
    let event = next_event(&mut socket).await;
    assert_eq!(event.event, ChangeEventKind::DayClosed);

    // the day:closed payload settles the mirrored order, not regresses it
    mirror.apply_change(&event).unwrap();
    let local = mirror.get_order(&created.id).unwrap().unwrap();
    assert_eq!(local.state, OrderState::Paid);
    assert!(local.items.iter().all(|i| i.state == ItemState::Delivered));
    assert!(mirror.list_active_orders().unwrap().is_empty());
    assert_eq!(mirror.list_closed_days().unwrap().len(), 1);
}
