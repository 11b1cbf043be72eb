//! Built-in dashboard page served at `/`.
//!
//! A single self-contained HTML document: a chat pane backed by `/api/chat`,
//! a model picker fed by `/api/models`, and a raw configuration editor that
//! round-trips the masked document through `/api/config`.

use axum::response::Html;

const DASHBOARD_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>Manus Panel</title>
  <style>
    *, *::before, *::after { box-sizing: border-box; margin: 0; padding: 0; }
    body {
      font-family: system-ui, -apple-system, sans-serif;
      background: #0f0f0f; color: #e0e0e0;
      display: grid; grid-template-columns: 2fr 1fr; gap: 1rem;
      height: 100vh; padding: 1rem;
    }
    section {
      display: flex; flex-direction: column; gap: 0.5rem;
      border: 1px solid #333; border-radius: 12px;
      background: #1a1a1a; padding: 1rem; min-height: 0;
    }
    h1 { font-size: 1.1rem; }
    #log { flex: 1; overflow-y: auto; font-size: 0.9rem; }
    .msg { margin: 0.4rem 0; white-space: pre-wrap; }
    .user { color: #c0c0e0; }
    .warning { color: #e0c060; }
    .error { color: #e06060; }
    textarea, select, input, button {
      background: #111; color: #e0e0e0; border: 1px solid #333;
      border-radius: 8px; padding: 0.5rem; font: inherit;
    }
    #config { flex: 1; font-family: ui-monospace, monospace; font-size: 0.8rem; }
    button { background: #2a2a3a; cursor: pointer; }
    button:hover { background: #3a3a5a; }
    #status { font-size: 0.8rem; color: #888; }
  </style>
</head>
<body>
  <section>
    <h1>Chat</h1>
    <select id="model"></select>
    <div id="log"></div>
    <form id="chat-form">
      <input id="message" autocomplete="off" placeholder="Ask something…" style="width:80%" />
      <button type="submit">Send</button>
    </form>
  </section>
  <section>
    <h1>Configuration</h1>
    <div id="status"></div>
    <textarea id="config" spellcheck="false"></textarea>
    <button id="save">Save</button>
  </section>
  <script>
    const context = [];
    const log = document.getElementById('log');
    const status = document.getElementById('status');

    function append(text, cls) {
      const div = document.createElement('div');
      div.className = 'msg ' + (cls || '');
      div.textContent = text;
      log.appendChild(div);
      log.scrollTop = log.scrollHeight;
    }

    async function loadModels() {
      const res = await fetch('/api/models');
      const { models } = await res.json();
      const select = document.getElementById('model');
      select.innerHTML = '';
      for (const m of models) {
        const opt = document.createElement('option');
        opt.value = m.id;
        opt.textContent = m.name;
        select.appendChild(opt);
      }
    }

    async function loadConfig() {
      const res = await fetch('/api/config');
      const body = await res.json();
      document.getElementById('config').value = JSON.stringify(body.config, null, 2);
      status.textContent = body.error ? ('defaults shown: ' + body.error) : body.path;
    }

    document.getElementById('chat-form').addEventListener('submit', async (ev) => {
      ev.preventDefault();
      const input = document.getElementById('message');
      const message = input.value.trim();
      if (!message) return;
      input.value = '';
      append(message, 'user');
      const model = document.getElementById('model').value;
      const res = await fetch('/api/chat', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ message, context, model }),
      });
      const body = await res.json();
      append(body.response || body.error, body.status);
      if (body.status === 'success') {
        context.push({ role: 'user', content: message });
        context.push({ role: 'assistant', content: body.response });
      }
    });

    document.getElementById('save').addEventListener('click', async () => {
      let doc;
      try {
        doc = JSON.parse(document.getElementById('config').value);
      } catch (e) {
        status.textContent = 'invalid JSON: ' + e.message;
        return;
      }
      const res = await fetch('/api/config', {
        method: 'PUT',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify(doc),
      });
      const body = await res.json();
      status.textContent = body.success ? 'saved' : ('save failed: ' + body.error);
      if (body.success) { loadModels(); loadConfig(); }
    });

    loadModels();
    loadConfig();
  </script>
</body>
</html>
"#;

/// GET /: dashboard page.
pub(super) async fn root() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}
