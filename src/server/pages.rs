// HTML pages. Plain format! rendering; every dynamic value goes through `escape`.

use super::handlers::FlashQuery;
use crate::auth::Session;
use crate::certificate::CertificateView;
use crate::error::FieldError;
use crate::owner::{Owner, OwnerForm};
use chrono::NaiveDate;

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<main>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
        body = body
    )
}

fn flash_html(flash: &FlashQuery) -> String {
    let mut html = String::new();
    if let Some(msg) = &flash.msg {
        html.push_str(&format!(r#"<p class="flash success">{}</p>"#, escape(msg)));
    }
    if let Some(error) = &flash.error {
        html.push_str(&format!(r#"<p class="flash error">{}</p>"#, escape(error)));
    }
    html
}

fn owner_rows(owner: &Owner) -> String {
    let fields = [
        ("Certificate No.", owner.id.to_string()),
        ("Owner Name", owner.owner_name.clone()),
        ("Father's Name", owner.father_name.clone()),
        ("Mobile No.", owner.mobile_no.clone()),
        ("Address", owner.address.clone()),
        ("Vehicle No.", owner.vehicle_no.clone()),
        ("Vehicle Model", owner.vehicle_model.clone()),
        ("Chassis No.", owner.chassis_no.clone()),
        ("Engine No.", owner.engine_no.clone()),
        ("Registered On", owner.today_date.format("%d/%m/%Y").to_string()),
    ];

    fields
        .iter()
        .map(|(label, value)| format!("<tr><th>{}</th><td>{}</td></tr>\n", label, escape(value)))
        .collect()
}

pub fn login(flash: &FlashQuery) -> String {
    let body = format!(
        r#"<h1>Login</h1>
{flash}
<form method="post" action="/login/">
<label>Username <input type="text" name="username" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Login</button>
</form>"#,
        flash = flash_html(flash)
    );
    layout("Login", &body)
}

pub fn home(session: &Session, form: &OwnerForm, errors: &[FieldError], flash: &FlashQuery) -> String {
    let input = |name: &str, label: &str, value: &str, kind: &str| {
        let field_errors: String = errors
            .iter()
            .filter(|e| e.field == name)
            .map(|e| format!(r#"<span class="field-error">{}</span>"#, escape(&e.message)))
            .collect();
        format!(
            r#"<label>{label} <input type="{kind}" name="{name}" value="{value}">{field_errors}</label>
"#,
            label = label,
            kind = kind,
            name = name,
            value = escape(value),
            field_errors = field_errors
        )
    };

    let mut fields = String::new();
    fields.push_str(&input("owner_name", "Owner Name", &form.owner_name, "text"));
    fields.push_str(&input("father_name", "Father's Name", &form.father_name, "text"));
    fields.push_str(&input("mobile_no", "Mobile No.", &form.mobile_no, "tel"));
    fields.push_str(&input("address", "Address", &form.address, "text"));
    fields.push_str(&input("vehicle_no", "Vehicle No.", &form.vehicle_no, "text"));
    fields.push_str(&input("vehicle_model", "Vehicle Model", &form.vehicle_model, "text"));
    fields.push_str(&input("chassis_no", "Chassis No.", &form.chassis_no, "text"));
    fields.push_str(&input("engine_no", "Engine No.", &form.engine_no, "text"));
    fields.push_str(&input("today_date", "Registration Date", &form.today_date, "date"));

    let body = format!(
        r#"<nav>Signed in as {user} | <a href="/search/">Search</a> | <a href="/logout/">Logout</a></nav>
{flash}
<h1>Register Vehicle Owner</h1>
<form method="post" action="/home/">
{fields}<button type="submit">Save</button>
</form>"#,
        user = escape(&session.username),
        flash = flash_html(flash),
        fields = fields
    );
    layout("Register Owner", &body)
}

pub fn success() -> String {
    layout(
        "Saved",
        r#"<h1>Record saved</h1>
<p><a href="/home/">Register another</a> | <a href="/search/">Search records</a></p>"#,
    )
}

pub fn search(owners: &[Owner], today: NaiveDate, message: Option<&str>) -> String {
    let rows: String = owners
        .iter()
        .map(|owner| {
            format!(
                r#"<tr><td>{id}</td><td>{name}</td><td>{vehicle}</td><td>{date}</td><td><a href="/certificate/{id}/">View</a></td></tr>
"#,
                id = owner.id,
                name = escape(&owner.owner_name),
                vehicle = escape(&owner.vehicle_no),
                date = owner.today_date.format("%m/%d/%Y")
            )
        })
        .collect();

    let message = message
        .map(|m| format!(r#"<p class="flash error">{}</p>"#, escape(m)))
        .unwrap_or_default();

    let results = if owners.is_empty() {
        "<p>No records found.</p>".to_string()
    } else {
        format!(
            r#"<table>
<thead><tr><th>No.</th><th>Owner</th><th>Vehicle No.</th><th>Date</th><th></th></tr></thead>
<tbody>
{rows}</tbody>
</table>"#,
            rows = rows
        )
    };

    let body = format!(
        r#"<h1>Search Certificates</h1>
<p class="date">{today}</p>
{message}
<form method="post" action="/search/">
<label>Vehicle No. <input type="text" name="vecregno"></label>
<label>From <input type="date" name="from_date"></label>
<label>To <input type="date" name="to_date"></label>
<button type="submit">Search</button>
</form>
{results}"#,
        today = today.format("%m/%d/%Y"),
        message = message,
        results = results
    );
    layout("Search", &body)
}

pub fn certificate(view: &CertificateView) -> String {
    let body = match (&view.certificate, &view.qr_image_url) {
        (Some(owner), qr) => {
            let qr = qr
                .as_deref()
                .map(|url| format!(r#"<img class="qr" src="{}" alt="QR code">"#, url))
                .unwrap_or_default();
            format!(
                r#"<h1>Vehicle Ownership Certificate</h1>
<table class="certificate">
{rows}</table>
{qr}"#,
                rows = owner_rows(owner),
                qr = qr
            )
        }
        (None, _) => format!(
            r#"<h1>Certificate</h1>
<p class="flash error">{}</p>"#,
            escape(view.error_message.as_deref().unwrap_or_default())
        ),
    };
    layout("Certificate", &body)
}

pub fn user_data(owner: Option<&Owner>) -> String {
    let body = match owner {
        Some(owner) => format!(
            r#"<h1>Vehicle Owner Details</h1>
<table class="certificate">
{}</table>"#,
            owner_rows(owner)
        ),
        None => "<h1>Vehicle Owner Details</h1>\n<p>No record found.</p>".to_string(),
    };
    layout("Owner Details", &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#x27;y&#x27;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_search_page_formats_today() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let html = search(&[], today, Some("bad <date>"));

        assert!(html.contains("03/09/2024"));
        assert!(html.contains("No records found."));
        assert!(html.contains("bad &lt;date&gt;"));
    }

    #[test]
    fn test_home_shows_field_errors_next_to_field() {
        let session = Session {
            session_id: "s".to_string(),
            user_id: 1,
            username: "clerk".to_string(),
            created_at: chrono::Utc::now(),
        };
        let form = OwnerForm {
            vehicle_no: "<KA>".to_string(),
            ..Default::default()
        };
        let errors = vec![FieldError::new("vehicle_no", "Too short.")];

        let html = home(&session, &form, &errors, &FlashQuery::default());

        assert!(html.contains(r#"name="vehicle_no" value="&lt;KA&gt;"><span class="field-error">Too short.</span>"#));
        assert!(html.contains("Signed in as clerk"));
    }
}
