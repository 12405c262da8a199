//! Tests for the theme engine

use super::*;
use crate::models::User;
use std::fs;
use tempfile::TempDir;
use tera::Context as TeraContext;

/// Engine with no overrides (the theme path does not exist)
fn default_engine() -> (TempDir, ThemeEngine) {
    let temp_dir = TempDir::new().unwrap();
    let theme = ThemeConfig {
        path: temp_dir.path().join("missing"),
    };
    let engine = ThemeEngine::new(&theme, &SiteConfig::default()).unwrap();
    (temp_dir, engine)
}

fn render_date(engine: &ThemeEngine, value: &str) -> String {
    let mut tera = engine.tera.clone();
    tera.add_raw_template("date.txt", "{{ at | ko_date }}").unwrap();
    let mut context = TeraContext::new();
    context.insert("at", value);
    tera.render("date.txt", &context).unwrap()
}

fn page_context() -> (TeraContext, StandardTemplateVars) {
    (TeraContext::new(), StandardTemplateVars::new("/", SessionState::Anonymous))
}

#[test]
fn test_embedded_templates_are_loaded() {
    let (_dir, engine) = default_engine();

    for name in [
        "base.html",
        AUTH_BUTTON_TEMPLATE,
        "home.html",
        "posts.html",
        "post.html",
        "compose.html",
        "profile.html",
        "login.html",
        "signup.html",
        "not_found.html",
    ] {
        assert!(engine.has_template(name), "missing template {}", name);
    }
}

#[test]
fn test_auth_button_renders_nothing_while_unknown() {
    let (_dir, engine) = default_engine();
    let html = engine.render_auth_button(&SessionState::Unknown).unwrap();
    assert!(html.trim().is_empty());
}

#[test]
fn test_auth_button_for_anonymous() {
    let (_dir, engine) = default_engine();
    let html = engine.render_auth_button(&SessionState::Anonymous).unwrap();
    assert!(html.contains("/login"));
    assert!(html.contains("회원가입"));
    assert!(!html.contains("로그아웃"));
}

#[test]
fn test_auth_button_for_authenticated() {
    let (_dir, engine) = default_engine();
    let state = SessionState::Authenticated(User::new("u-1", None));
    let html = engine.render_auth_button(&state).unwrap();
    assert!(html.contains("/profile"));
    assert!(html.contains("로그아웃"));
    assert!(!html.contains("/signup"));
}

#[test]
fn test_render_page_adds_standard_vars() {
    let (_dir, engine) = default_engine();
    let (mut context, vars) = page_context();
    context.insert("posts", &Vec::<serde_json::Value>::new());

    let html = engine.render_page("home.html", &context, &vars).unwrap();

    assert!(html.contains("My Blog"));
    assert!(html.contains("아직 게시글이 없습니다."));
    assert!(html.contains("/login"));
}

#[test]
fn test_user_content_is_escaped() {
    let (_dir, engine) = default_engine();
    let (mut context, vars) = page_context();
    context.insert(
        "posts",
        &vec![serde_json::json!({
            "id": 1,
            "title": "<script>alert(1)</script>",
            "content": "body",
            "author": "익명",
            "created_at": "2024-01-01T00:00:00Z",
        })],
    );

    let html = engine.render_page("posts.html", &context, &vars).unwrap();

    assert!(!html.contains("<script>alert(1)</script>"));
    assert!(html.contains("&lt;script&gt;"));
}

#[test]
fn test_theme_override_replaces_embedded_template() {
    let temp_dir = TempDir::new().unwrap();
    let themes_path = temp_dir.path().join("themes");
    fs::create_dir_all(themes_path.join("partials")).unwrap();
    fs::write(
        themes_path.join("not_found.html"),
        r#"{% extends "base.html" %}{% block content %}<p>custom missing page</p>{% endblock content %}"#,
    )
    .unwrap();

    let theme = ThemeConfig { path: themes_path };
    let engine = ThemeEngine::new(&theme, &SiteConfig::default()).unwrap();
    let (context, vars) = page_context();

    let html = engine.render_page("not_found.html", &context, &vars).unwrap();

    assert!(html.contains("custom missing page"));
    assert!(engine.has_template("home.html"));
}

#[test]
fn test_broken_override_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("home.html"), "{% if %}").unwrap();

    let theme = ThemeConfig {
        path: temp_dir.path().to_path_buf(),
    };
    let result = ThemeEngine::new(&theme, &SiteConfig::default());

    assert!(matches!(result, Err(ThemeError::TemplateError(_))));
}

#[test]
fn test_render_missing_template_fails() {
    let (_dir, engine) = default_engine();
    let err = engine.render("nope.html", &TeraContext::new()).unwrap_err();
    assert!(err.to_string().contains("nope.html"));
}

#[test]
fn test_ko_date_uses_configured_offset() {
    let (_dir, engine) = default_engine();
    // 20:00 UTC is the next morning in KST
    assert_eq!(render_date(&engine, "2024-01-01T20:00:00Z"), "2024년 1월 2일");
    assert_eq!(render_date(&engine, "2024-12-25T00:00:00.000Z"), "2024년 12월 25일");
}

#[test]
fn test_ko_date_with_utc_offset() {
    let temp_dir = TempDir::new().unwrap();
    let theme = ThemeConfig {
        path: temp_dir.path().join("missing"),
    };
    let site = SiteConfig {
        utc_offset_hours: 0,
        ..SiteConfig::default()
    };
    let engine = ThemeEngine::new(&theme, &site).unwrap();

    assert_eq!(render_date(&engine, "2024-01-01T20:00:00Z"), "2024년 1월 1일");
}

#[test]
fn test_ko_date_passes_through_unparseable_values() {
    let (_dir, engine) = default_engine();
    assert_eq!(render_date(&engine, "yesterday"), "yesterday");
}

#[test]
fn test_simple_error_page_escapes_message() {
    let html = ThemeEngine::simple_error_page("<b>bad</b>");
    assert!(html.contains("&lt;b&gt;bad&lt;&#x2F;b&gt;"));
}
