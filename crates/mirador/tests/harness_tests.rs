//! End-to-end page case runs against the mock driver.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mirador::prelude::*;
use std::time::Duration;

// =============================================================================
// Fixtures
// =============================================================================

fn landing_page() -> MockDriver {
    MockDriver::new()
        .with_document(DocumentState {
            title: "Kalm | Home".to_string(),
            stylesheets: vec![StylesheetInfo::loaded(Some("/main.css"), 42)],
            fonts: FontStatus {
                count: 2,
                ready: true,
            },
            ..DocumentState::default()
        })
        .with_elements(
            "p",
            vec![
                RawElement::new(1, "p")
                    .with_text("Welcome")
                    .with_style(StyleProperty::Color, "rgba(0, 0, 0, 0)"),
                RawElement::new(2, "p")
                    .with_text("Book a session")
                    .with_style(StyleProperty::Color, "rgb(1, 1, 1)"),
            ],
        )
}

fn config() -> HarnessConfig {
    HarnessConfig::new().with_settle(Duration::ZERO)
}

async fn run(driver: &mut MockDriver, case: &PageCase) -> RunReport {
    PageSession::new(driver, &config(), "http://kalm.lk/")
        .run(case)
        .await
        .expect("case should run")
}

// =============================================================================
// Snapshot rules
// =============================================================================

#[tokio::test]
async fn transparent_paragraph_is_the_only_offender() {
    let mut driver = landing_page();
    let case = PageCase::new("colors", "/").rule(Rule::new(
        "no-transparent-text",
        Check::NoTransparentText {
            selector: Locator::css("p"),
            leaf_text: false,
        },
    ));
    let report = run(&mut driver, &case).await;

    assert_eq!(report.summary.failed, 1);
    let verdict = &report.verdicts[0];
    assert_eq!(verdict.page, "colors");
    assert_eq!(verdict.offenders.len(), 1);
    assert_eq!(verdict.offenders[0].subject, Subject::Element(1));
    assert!(report.failing_rules().any(|r| r == "no-transparent-text"));
}

#[tokio::test]
async fn empty_button_list_passes_background_presence() {
    let mut driver = landing_page();
    let case = PageCase::new("buttons", "/").rule(Rule::new(
        "button-background",
        Check::BackgroundPresence {
            selector: Locator::css("button"),
            leaf_text: false,
        },
    ));
    let report = run(&mut driver, &case).await;

    assert!(report.is_success());
    assert_eq!(report.verdicts[0].examined, 0);
    assert!(report.verdicts[0].offenders.is_empty());
}

#[tokio::test]
async fn zero_match_selector_observes_nothing() {
    let mut driver = landing_page();
    let spec = ObservationSpec::new().scope(Scope::all(Locator::css(".missing")));
    driver.navigate("http://kalm.lk/", Readiness::Load).await.unwrap();

    let snapshot = collect(&driver, &spec).await.unwrap();
    assert!(snapshot.elements(&Scope::all(Locator::css(".missing"))).is_empty());
}

#[tokio::test]
async fn document_rules_see_title_and_fonts() {
    let mut driver = landing_page();
    let case = PageCase::new("document", "/")
        .rule(Rule::new("title", Check::TitleNonEmpty))
        .rule(Rule::new("fonts", Check::FontsReady))
        .rule(Rule::new("sheets", Check::StylesheetsLoaded));
    let report = run(&mut driver, &case).await;

    assert_eq!(report.summary.passed, 3);
    assert!(report.into_result().is_ok());
}

// =============================================================================
// Console rules
// =============================================================================

#[tokio::test]
async fn font_load_failure_is_a_disallowed_event() {
    let mut driver =
        landing_page().with_load_event(PageEvent::new(EventKind::Error, "font load failed"));
    let case = PageCase::new("fonts", "/").rule(Rule::new(
        "font-errors",
        Check::ConsoleTextMatch {
            kinds: [EventKind::Error].into_iter().collect(),
            substrings: vec!["font".to_string()],
        },
    ));
    let report = run(&mut driver, &case).await;

    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].matched.len(), 1);
    assert_eq!(report.summary.disallowed_events, 1);
    assert!(matches!(
        report.into_result(),
        Err(MiradorError::UnexpectedConsoleEvent { found: 1, max_allowed: 0, .. })
    ));
}

#[tokio::test]
async fn events_arrive_in_emission_order() {
    let mut driver = landing_page()
        .with_load_event(PageEvent::new(EventKind::Log, "first"))
        .with_load_event(PageEvent::new(EventKind::Warning, "second"))
        .with_load_event(PageEvent::new(EventKind::PageError, "third"));
    let report = run(&mut driver, &PageCase::new("order", "/")).await;

    let texts: Vec<&str> = report.events["order"]
        .iter()
        .map(|e| e.text.as_str())
        .collect();
    assert_eq!(texts, ["first", "second", "third"]);
}

// =============================================================================
// Interactions
// =============================================================================

#[tokio::test(start_paused = true)]
async fn click_timeout_fails_one_button_and_continues() {
    let mut driver = MockDriver::new()
        .with_elements(
            "button",
            vec![
                RawElement::new(1, "button").with_text("Stuck"),
                RawElement::new(2, "button").with_text("Fine"),
                RawElement::new(3, "button").with_text("Also fine"),
            ],
        )
        .with_click_delay("button", 0, Duration::from_secs(60));
    let case = PageCase::new("buttons", "/").interaction(Interaction::ClickEach {
        selector: Locator::css("button"),
        timeout_ms: Some(1000),
        severity: Severity::Error,
    });
    let report = run(&mut driver, &case).await;

    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.passed, 2);
    assert!(driver.was_called("click:button#2"));
}

#[tokio::test]
async fn follow_link_checks_destination() {
    let mut driver = MockDriver::new()
        .with_elements("text=About", vec![RawElement::new(7, "a").with_text("About")])
        .with_click_target("text=About", 0, "http://kalm.lk/about");
    let case = PageCase::new("menu", "/").interaction(Interaction::FollowLink {
        selector: Locator::text("About"),
        url_pattern: "about".to_string(),
        timeout_ms: Some(1000),
    });
    let report = run(&mut driver, &case).await;

    assert!(report.is_success(), "{report}");
}

// =============================================================================
// Suites
// =============================================================================

#[tokio::test]
async fn yaml_suite_runs_and_merges() {
    let suite = Suite::from_yaml(
        r"
name: smoke
base_url: http://kalm.lk
cases:
  - name: home
    rules:
      - name: paragraphs
        check: no-transparent-text
        selector: p
  - name: register
    path: /register
    rules:
      - name: title
        check: title-non-empty
",
    )
    .unwrap();

    let mut total = RunReport::default();
    for case in &suite.cases {
        let mut driver = landing_page();
        total.merge(run(&mut driver, case).await);
    }
    assert_eq!(total.summary.verdicts, 2);
    assert_eq!(total.summary.total_failures, 1);
    assert_eq!(total.failures_by_rule["paragraphs"][0].page, "home");
}

#[tokio::test]
async fn aborted_case_counts_as_failure() {
    let mut driver = landing_page();
    driver.fail_navigation = true;
    let case = PageCase::new("down", "/");
    let err = PageSession::new(&mut driver, &config(), "http://kalm.lk/")
        .run(&case)
        .await
        .unwrap_err();

    let report = RunReport::aborted(&case.name, &err);
    assert_eq!(report.summary.total_failures, 1);
    assert!(matches!(
        report.into_result(),
        Err(MiradorError::AssertionFailure { .. })
    ));
}

#[test]
fn builtin_suite_is_valid() {
    let suite = Suite::builtin(DEFAULT_BASE_URL);
    suite.validate().unwrap();
    assert!(suite.cases.iter().any(|c| c.path == "/register"));
}
