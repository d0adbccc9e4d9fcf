//! The handful of HTML pages the relay serves itself.

pub fn escape_html(raw: &str) -> String {
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

/// Landing page. Setup links are only shown when first-party setup is on.
pub fn ready_page(setup_environments: &[&str]) -> String {
    let mut page = String::from("<html><body><h1>Server is Ready</h1>");
    for name in setup_environments {
        let name = escape_html(name);
        page.push_str(&format!(
            "<a href=\"/setup/{name}\">Setup a {name} account</a><br/>"
        ));
    }
    page.push_str("</body></html>");
    page
}

pub fn setup_page(sdk_token: &str) -> String {
    format!(
        "<html><body><h1>InitializeMerchant Token</h1>\
         <p>This token requires this server to be running so it can be refreshed \
         automatically. It will work for about 8 hours before a refresh is required.</p><br/>\
         <textarea id=\"key\" cols=\"100\" rows=\"10\">{}</textarea>\
         <script type=\"text/javascript\">document.getElementById(\"key\").select();</script>\
         </body></html>",
        escape_html(sdk_token)
    )
}

pub fn config_errors_page(errors: &[String]) -> String {
    let items: String = errors
        .iter()
        .map(|e| format!("<li>{}</li>", escape_html(e)))
        .collect();
    format!("<html><body><h1>Configuration Errors</h1><ul>{items}</ul></body></html>")
}
