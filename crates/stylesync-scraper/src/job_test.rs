use stylesync_core::{BoxSource, LinkInput};

use super::*;
use crate::events::{BufferedSink, JobReport, NdjsonDecoder, WriterSink};
use crate::testing::{FakeDriver, FakeLauncher};

const BASE: &str = "https://erp.test";
const DASHBOARD: &str = r#"<html><body><div class="app-outlet">Welcome</div></body></html>"#;

const MATERIALS: &str = r#"<html><body>
  <table><tr><td data-tab-name="materials">Materials</td></tr></table>
  <div class="pagesTab" data-tab-name="materials"><div class="pagesMiddle" name="Style No.">
    <table class="standardList">
      <thead><tr><th>Assortment</th><th>S</th><th>M</th><th>Total</th></tr></thead>
      <tbody>
        <tr><td><input type="checkbox" checked><input type="text" value="Pack A"></td><td>1</td><td>2</td><td>3</td></tr>
        <tr><td>FREE</td><td>4</td><td>0</td><td>4</td></tr>
      </tbody>
    </table>
  </div></div></body></html>"#;

const LIST_PAGE: &str = r#"<html><body><button name="show_all">Show all</button>
  <table class="standardList">
    <thead><tr><th></th><th>Style No.</th><th>Brand</th><th>Season</th><th>Supplier</th></tr></thead>
    <tbody>
      <tr data-reference="1"><td></td><td><a href="/?controller=Style%5CIndex&action=Edit&id=1">A-1</a></td><td>Acme</td><td>AW25</td><td>Mill</td></tr>
      <tr data-reference="2"><td></td><td><a href="/?controller=Style%5CIndex&action=Edit&id=2">A-2</a></td><td>Acme</td><td>AW25</td><td>Mill</td></tr>
      <tr data-reference="3"><td></td><td><a href="/?controller=Style%5CIndex&action=Edit&id=3">A-3</a></td><td>Acme</td><td>SS26</td><td>Mill</td></tr>
    </tbody>
  </table></body></html>"#;

const PURCHASES: &str = r#"<html><body><div class="app-outlet"><table>
  <thead><tr><th>PO</th><th>ETA</th></tr></thead>
  <tbody><tr><td><a href="/app/purchase/edit/7">PO-7</a></td><td>2026-12-01</td></tr></tbody>
</table></div></body></html>"#;

const EXPANDED_STAT_PAGE: &str = r#"<html><body><div class="statAndStockBox">
  <table><tbody>
    <tr class="tableBackgroundBlack"><td>Black</td><td>S</td><td>M</td><td>L</td></tr>
    <tr><td>Stock</td><td>10</td><td>5</td><td>0</td></tr>
  </tbody></table>
  <div class="statAndStockDetails"><table class="tableRadius5 tableBorder"><tbody>
    <tr><td>Black<br>100% wool</td><td>S</td><td>M</td><td>L</td><td>Total</td></tr>
    <tr><td>FREE</td><td>6</td><td>4</td><td>0</td><td>10</td></tr>
    <tr class="stylecolor-expanded--main"><td>Stock</td><td>10</td><td>5</td><td>0</td><td>15</td></tr>
    <tr class="stylecolor-expanded--header"><td>Sold</td></tr>
    <tr class="stylecolor-expanded--main"><td>Stock</td><td>1</td><td>1</td><td>0</td><td>2</td></tr>
    <tr class="stylecolor-expanded--header"><td>Purchase</td></tr>
    <tr class="stylecolor-expanded--sub">
      <td><a href="/app/purchase/edit/100">PO-100</a><span class="right">2026-11-02</span></td>
      <td>4</td><td>0</td><td>0</td><td>4</td>
    </tr>
    <tr class="stylecolor-expanded--sub"><td>Stock Dedicated</td><td>2</td><td>0</td><td>0</td><td>2</td></tr>
  </tbody></table></div>
</div></body></html>"#;

const COLLAPSED_STAT_PAGE: &str = r#"<html><body><div class="statAndStockBox"><table><tbody>
  <tr class="tableBackgroundBlack"><td>Navy<br>cotton</td><td>S</td><td>M</td></tr>
  <tr><td>Delivered</td><td>6</td><td>6</td><td>12</td></tr>
  <tr><td>Stock</td><td>4</td><td>1,200</td><td>1204</td></tr>
  <tr><td>Available</td><td>3</td><td>-</td><td>3</td></tr>
  <tr><td>Total</td><td>99</td><td>99</td><td>198</td></tr>
</tbody></table></div></body></html>"#;

const BASKET_PAGE: &str = r#"<html><body><div class="basketbox">
  <table class="standardList">
    <thead><tr><th>Customer</th><th>Qty</th></tr></thead>
    <tbody>
      <tr><td><a href="/customer/12">Shop 12</a></td><td>3</td></tr>
      <tr><td>Shop 14</td><td>1</td></tr>
    </tbody>
  </table></div></body></html>"#;

fn settings() -> JobSettings {
    JobSettings {
        base_url: BASE.to_string(),
        credentials: Some(Credentials {
            username: "buyer".into(),
            password: "secret".into(),
        }),
        timings: Timings::instant(),
    }
}

fn link(href: &str) -> LinkInput {
    LinkInput {
        href: href.to_string(),
        ..LinkInput::default()
    }
}

fn detail_request() -> JobRequest {
    JobRequest {
        mode: JobMode::Detail,
        links: vec![
            link("/?controller=Style%5CIndex&action=Edit&id=41"),
            link("/?controller=Style%5CIndex&action=Edit&id=42"),
            link("/?controller=Style%5CIndex&action=Edit&id=41"),
        ],
        ..JobRequest::default()
    }
}

fn detail_driver() -> FakeDriver {
    FakeDriver::new()
        .with_page("action=GetLoginPage", DASHBOARD)
        .with_page("id=41", MATERIALS)
        .with_page("id=42", "<html><body>Loading…</body></html>")
}

async fn run_buffered(
    launcher: &FakeLauncher,
    settings: &JobSettings,
    request: &JobRequest,
) -> JobReport {
    let mut sink = BufferedSink::new();
    let _ = run_job(launcher, settings, request, &mut sink).await;
    sink.into_report()
}

fn messages(report: &JobReport) -> Vec<&str> {
    report.logs.iter().map(|l| l.m.as_str()).collect()
}

#[tokio::test]
async fn item_failure_does_not_abort_job() {
    let driver = detail_driver();
    let launcher = FakeLauncher::new(driver.clone());
    let report = run_buffered(&launcher, &settings(), &detail_request()).await;

    assert!(report.ok);
    assert!(report.error.is_none());
    assert_eq!(report.items.len(), 2);

    let ExtractionEvent::Item(first) = &report.items[0] else {
        panic!("expected item event, got {:?}", report.items[0]);
    };
    assert!(first.ok);
    assert_eq!(first.index, 0);
    assert_eq!(first.item.style_no, "41");
    let detail = first.data.as_ref().expect("data");
    assert_eq!(detail.sizes, vec!["S", "M"]);
    assert_eq!(detail.free, Some(vec![4.0, 0.0]));

    let ExtractionEvent::Item(second) = &report.items[1] else {
        panic!("expected item event");
    };
    assert!(!second.ok);
    assert_eq!(second.index, 1);
    assert!(second.data.is_none());
    assert_eq!(
        second.error.as_deref(),
        Some("Size table not found on https://erp.test/?controller=Style%5CIndex&action=Edit&id=42")
    );

    assert!(driver.is_closed());
    assert_eq!(messages(&report).first().copied(), Some("BEGIN detail job"));
}

#[tokio::test]
async fn missing_credentials_fail_before_launch() {
    let driver = FakeDriver::new();
    let launcher = FakeLauncher {
        driver: driver.clone(),
        fail: true,
    };
    let settings = JobSettings {
        credentials: None,
        ..settings()
    };
    let mut sink = BufferedSink::new();

    let err = run_job(&launcher, &settings, &detail_request(), &mut sink)
        .await
        .unwrap_err();
    let report = sink.into_report();

    assert!(matches!(err, JobError::Auth(crate::error::AuthError::MissingCredentials)));
    assert!(!report.ok);
    assert_eq!(report.error.as_deref(), Some("Missing SPY_USER or SPY_PASS"));
    assert!(report.items.is_empty());
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn launch_failure_is_reported_on_done() {
    let launcher = FakeLauncher {
        driver: FakeDriver::new(),
        fail: true,
    };
    let report = run_buffered(&launcher, &settings(), &detail_request()).await;

    assert!(!report.ok);
    assert_eq!(report.error.as_deref(), Some("browser launch failed: chrome not found"));
}

#[tokio::test]
async fn list_failure_aborts_and_still_closes_browser() {
    let driver = FakeDriver::new()
        .with_page("action=GetLoginPage", DASHBOARD)
        .with_page("action=List", "<html><body><table class=standardList></table></body></html>");
    let request = JobRequest {
        mode: JobMode::Stock,
        ..JobRequest::default()
    };
    let report = run_buffered(&FakeLauncher::new(driver.clone()), &settings(), &request).await;

    assert!(!report.ok);
    assert_eq!(report.error.as_deref(), Some("Style list table not loaded within 20ms"));
    assert!(report.items.is_empty());
    assert!(driver.is_closed());
    assert!(messages(&report).contains(&"STEP: Browser closed"));
}

#[tokio::test]
async fn login_failure_closes_browser() {
    let driver = FakeDriver::new().fail_navigation_to("GetLoginPage");
    let launcher = FakeLauncher::new(driver.clone());
    let report = run_buffered(&launcher, &settings(), &detail_request()).await;

    assert!(!report.ok);
    assert!(report.error.is_some_and(|e| e.starts_with("navigation to")));
    assert!(driver.is_closed());
}

#[tokio::test]
async fn skip_details_emits_rows_up_to_limit() {
    let driver = FakeDriver::new()
        .with_page("action=GetLoginPage", DASHBOARD)
        .with_page("action=List&show_all=1", LIST_PAGE);
    let request = JobRequest {
        mode: JobMode::Detail,
        skip_details: true,
        limit: Some(2),
        ..JobRequest::default()
    };
    let report = run_buffered(&FakeLauncher::new(driver.clone()), &settings(), &request).await;

    assert!(report.ok);
    let styles: Vec<&str> = report
        .items
        .iter()
        .map(|event| match event {
            ExtractionEvent::Row(row) => row.item.style_no.as_str(),
            other => panic!("expected row event, got {other:?}"),
        })
        .collect();
    assert_eq!(styles, vec!["A-1", "A-2"]);
    assert!(!driver.navigations().iter().any(|u| u.contains("action=Edit")));
}

#[tokio::test]
async fn non_positive_limit_keeps_every_item() {
    let driver = FakeDriver::new()
        .with_page("action=GetLoginPage", DASHBOARD)
        .with_page("action=List&show_all=1", LIST_PAGE);
    let request = JobRequest {
        skip_details: true,
        limit: Some(0),
        ..JobRequest::default()
    };
    let report = run_buffered(&FakeLauncher::new(driver), &settings(), &request).await;
    assert_eq!(report.items.len(), 3);
}

#[tokio::test]
async fn purchases_mode_captures_one_table_without_listing() {
    let driver = FakeDriver::new()
        .with_page("action=GetLoginPage", DASHBOARD)
        .with_page("/app/purchase/running", PURCHASES);
    let request = JobRequest {
        mode: JobMode::Purchases,
        ..JobRequest::default()
    };
    let report = run_buffered(&FakeLauncher::new(driver.clone()), &settings(), &request).await;

    assert!(report.ok);
    assert_eq!(report.items.len(), 1);
    let ExtractionEvent::Table(table) = &report.items[0] else {
        panic!("expected table event");
    };
    assert!(table.ok);
    assert_eq!(table.item.url, "https://erp.test/app/purchase/running");
    let snapshot = table.data.as_ref().expect("snapshot");
    assert_eq!(snapshot.head, vec!["PO", "ETA"]);
    assert_eq!(snapshot.rows[0][0].text, "PO-7");
    assert!(!driver.navigations().iter().any(|u| u.contains("action=List")));
}

#[tokio::test]
async fn missing_purchases_table_is_a_failed_event_not_a_failed_job() {
    let driver = FakeDriver::new().with_page("action=GetLoginPage", DASHBOARD);
    let request = JobRequest {
        mode: JobMode::Purchases,
        ..JobRequest::default()
    };
    let report = run_buffered(&FakeLauncher::new(driver), &settings(), &request).await;

    assert!(report.ok);
    let ExtractionEvent::Table(table) = &report.items[0] else {
        panic!("expected table event");
    };
    assert!(!table.ok);
}

fn single_link_request(mode: JobMode, id: u32) -> JobRequest {
    JobRequest {
        mode,
        links: vec![link(&format!("/?controller=Style%5CIndex&action=Edit&id={id}"))],
        ..JobRequest::default()
    }
}

#[tokio::test]
async fn statstock_free_job_reads_expanded_box() {
    let driver = FakeDriver::new()
        .with_page("action=GetLoginPage", DASHBOARD)
        .with_page("id=51", EXPANDED_STAT_PAGE);
    let request = single_link_request(JobMode::StatstockFree, 51);
    let report = run_buffered(&FakeLauncher::new(driver.clone()), &settings(), &request).await;

    assert!(report.ok);
    assert_eq!(report.items.len(), 1);
    let ExtractionEvent::StatstockFree(outcome) = &report.items[0] else {
        panic!("expected statstock_free event, got {:?}", report.items[0]);
    };
    assert!(outcome.ok);
    assert_eq!(outcome.item.style_no, "51");
    let variants = outcome.data.as_ref().expect("variants");
    assert_eq!(variants.len(), 1);

    let black = &variants[0];
    assert_eq!(black.source, BoxSource::Expanded);
    assert_eq!(black.sizes, vec!["S", "M", "L"]);
    let stock = black.stock.as_ref().expect("stock");
    assert_eq!(stock.per_size, vec![10.0, 5.0, 0.0]);
    assert!((stock.total - 15.0).abs() < f64::EPSILON);

    assert_eq!(black.sold_per_season.len(), 1);
    assert_eq!(black.sold_per_season[0].label, "Stock");
    assert_eq!(black.sold_per_season[0].per_size, vec![1.0, 1.0, 0.0]);

    let [order] = &black.purchase_orders[..] else {
        panic!("one purchase order");
    };
    assert_eq!(order.code, "PO-100");
    assert_eq!(order.link, "https://erp.test/app/purchase/edit/100");
    assert_eq!(order.eta.as_deref(), Some("2026-11-02"));
    assert_eq!(order.per_size, vec![4.0, 0.0, 0.0]);
    assert_eq!(order.dedicated_stock_per_size, Some(vec![2.0, 0.0, 0.0]));
    assert_eq!(order.dedicated_stock_total, Some(2.0));

    assert_eq!(
        driver.navigations().last().map(String::as_str),
        Some("https://erp.test/?controller=Style%5CIndex&action=Edit&id=51#tab=statandstock")
    );
    assert!(messages(&report).contains(&"STEP: 1 PO rows found for Black"));
    assert!(driver.is_closed());
}

#[tokio::test]
async fn stock_job_emits_collapsed_matrix() {
    let driver = FakeDriver::new()
        .with_page("action=GetLoginPage", DASHBOARD)
        .with_page("id=52", COLLAPSED_STAT_PAGE);
    let request = single_link_request(JobMode::Stock, 52);
    let report = run_buffered(&FakeLauncher::new(driver.clone()), &settings(), &request).await;

    assert!(report.ok);
    let ExtractionEvent::Stock(outcome) = &report.items[0] else {
        panic!("expected stock event, got {:?}", report.items[0]);
    };
    assert!(outcome.ok);
    assert_eq!(outcome.index, 0);
    let boxes = outcome.data.as_ref().expect("stock boxes");
    let [navy] = &boxes[..] else {
        panic!("one stock box");
    };
    assert_eq!(navy.color_name, "Navy");
    assert_eq!(navy.sizes, vec!["S", "M"]);
    assert_eq!(navy.stock.as_ref().expect("stock").per_size, vec![4.0, 1200.0]);
    assert_eq!(navy.delivered.as_ref().expect("delivered").per_size, vec![6.0, 6.0]);
    assert_eq!(navy.available.as_ref().expect("available").per_size, vec![3.0, 0.0]);
    assert!(navy.po.is_none());

    let wire = serde_json::to_value(&report.items[0]).expect("serialize");
    assert_eq!(wire["type"], "stock");
    assert_eq!(wire["style_no"], "52");
    assert_eq!(wire["data"][0]["stock"]["total"], 1204.0);
}

#[tokio::test]
async fn stock_pre_job_captures_basket_table() {
    let driver = FakeDriver::new()
        .with_page("action=GetLoginPage", DASHBOARD)
        .with_page("id=53", BASKET_PAGE);
    let request = single_link_request(JobMode::StockPre, 53);
    let report = run_buffered(&FakeLauncher::new(driver), &settings(), &request).await;

    assert!(report.ok);
    let ExtractionEvent::Table(outcome) = &report.items[0] else {
        panic!("expected table event, got {:?}", report.items[0]);
    };
    assert!(outcome.ok);
    assert_eq!(outcome.item.style_no, "53");
    let snapshot = outcome.data.as_ref().expect("snapshot");
    assert_eq!(snapshot.head, vec!["Customer", "Qty"]);
    assert_eq!(snapshot.rows.len(), 2);
    assert_eq!(snapshot.rows[0][0].text, "Shop 12");
    assert_eq!(
        snapshot.rows[0][0].link.as_ref().map(|l| l.href.as_str()),
        Some("https://erp.test/customer/12")
    );
    assert!(snapshot.rows[1][0].link.is_none());
    assert_eq!(snapshot.rows[1][1].text, "1");
}

#[tokio::test]
async fn streamed_events_match_buffered_report() {
    let launcher = FakeLauncher::new(detail_driver());
    let buffered = run_buffered(&launcher, &settings(), &detail_request()).await;

    let mut sink = WriterSink::new(Vec::new());
    let streaming = FakeLauncher::new(detail_driver());
    let _ = run_job(&streaming, &settings(), &detail_request(), &mut sink).await;
    let bytes = sink.into_inner();

    let mut decoder = NdjsonDecoder::new();
    let mut events: Vec<ExtractionEvent> = Vec::new();
    for chunk in bytes.chunks(7) {
        events.extend(decoder.push(chunk).into_iter().map(|e| e.expect("valid event")));
    }
    events.extend(decoder.finish());

    let Some(ExtractionEvent::Done(done)) = events.last() else {
        panic!("stream must end with done");
    };
    assert!(done.ok);

    let streamed_items: Vec<&ExtractionEvent> = events
        .iter()
        .filter(|e| !e.is_log() && !matches!(e, ExtractionEvent::Done(_)))
        .collect();
    let buffered_items: Vec<&ExtractionEvent> = buffered.items.iter().collect();
    assert_eq!(streamed_items, buffered_items);

    let streamed_logs = events.iter().filter(|e| e.is_log()).count();
    assert_eq!(streamed_logs, buffered.logs.len());
}

#[test]
fn job_future_is_send() {
    fn assert_send<T: Send>(_: T) {}

    let launcher = FakeLauncher::new(FakeDriver::new());
    let settings = settings();
    let request = JobRequest::default();
    let mut sink = BufferedSink::new();
    assert_send(run_job(&launcher, &settings, &request, &mut sink));
}

#[test]
fn settings_take_login_bound_from_config() {
    let config = stylesync_core::AppConfig {
        env: stylesync_core::Environment::Development,
        base_url: "https://erp.test/".to_string(),
        credentials: None,
        bind_addr: "127.0.0.1:3000".parse().expect("addr"),
        log_level: "info".to_string(),
        browser: stylesync_core::BrowserSettings {
            headless: true,
            executable: None,
            remote_url: None,
            user_agent: "test".to_string(),
            navigation_timeout_secs: 60,
        },
        login_settle_timeout_secs: 5,
        api_keys: Vec::new(),
        max_browsers: 2,
    };

    let settings = JobSettings::from_config(&config);

    assert_eq!(settings.base_url, "https://erp.test");
    assert_eq!(settings.timings.login_settle, Duration::from_secs(5));
    assert_eq!(settings.timings.list_rows, Timings::default().list_rows);
}
