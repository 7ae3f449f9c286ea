//! Editor host page
//!
//! A minimal page that frames the preview and relays its messages to the
//! session API. It accepts messages only from the preview's own window,
//! forwards them verbatim (validation happens server-side), shows the
//! resulting notice and reloads the preview at the reported scroll offset.

use crate::renderer::{escape_attr, IFRAME_SANDBOX};

/// Header carrying a session's edit token
pub const EDIT_TOKEN_HEADER: &str = "x-edit-token";

const HOST_SCRIPT: &str = include_str!("../assets/host.js");

const HOST_CSS: &str = "html,body{margin:0;height:100%;font-family:sans-serif}\
#vibestack-editor{display:flex;flex-direction:column;height:100%}\
#vibestack-notice{padding:6px 12px;min-height:1.2em;font-size:13px;color:#065f46}\
#vibestack-notice.error{color:#b91c1c}\
#vibestack-preview{flex:1;width:100%;border:0}";

/// Editor page for `session_id`. The relay authenticates with
/// `edit_token`, which only grants access to this session.
#[must_use]
pub fn host_page(session_id: &str, edit_token: &str) -> String {
    let session = escape_attr(session_id);
    let token = escape_attr(edit_token);
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>VibeStack Editor</title>\
         <meta name=\"referrer\" content=\"no-referrer\">\
         <style>{HOST_CSS}</style></head><body>\
         <div id=\"vibestack-editor\" data-session=\"{session}\" data-token=\"{token}\">\
         <div id=\"vibestack-notice\" role=\"status\"></div>\
         <iframe id=\"vibestack-preview\" sandbox=\"{IFRAME_SANDBOX}\" title=\"Generated Preview\" \
         src=\"/api/sessions/{session}/preview\"></iframe>\
         </div><script>{HOST_SCRIPT}</script></body></html>"
    )
}
