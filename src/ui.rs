use crate::models::{SessionStatus, SessionView};
use crate::plan::PLAN_DAYS;

pub fn render_index(view: &SessionView) -> String {
    let (label, text, date) = match &view.day {
        Some(day) => (
            format!("Day {} of {PLAN_DAYS}", day.label),
            day.text.clone(),
            day.date.clone(),
        ),
        None => (String::new(), String::new(), String::new()),
    };
    let signed_in = view.status != SessionStatus::SignedOut;

    INDEX_HTML
        .replace("{{AUTH_ACTIVE}}", if signed_in { "" } else { "active" })
        .replace("{{MAIN_ACTIVE}}", if signed_in { "active" } else { "" })
        .replace("{{EMAIL}}", &escape_html(view.email.as_deref().unwrap_or("")))
        .replace("{{DAY_LABEL}}", &escape_html(&label))
        .replace("{{READING}}", &escape_html(&text))
        .replace("{{DATE}}", &escape_html(&date))
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Daily Reader</title>
  <style>
    @import url('https://fonts.googleapis.com/css2?family=Space+Grotesk:wght@400;500;600&family=Fraunces:wght@600&display=swap');

    :root {
      --bg-1: #f8f3e6;
      --bg-2: #f5d3a7;
      --ink: #2b2a28;
      --accent: #ff6b4a;
      --accent-2: #2f4858;
      --done: #2d7a4b;
      --card: rgba(255, 255, 255, 0.86);
      --shadow: 0 24px 60px rgba(47, 72, 88, 0.18);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: radial-gradient(circle at top, var(--bg-2), transparent 60%),
        linear-gradient(135deg, var(--bg-1), #ffe9d4 60%, #f9f2e9 100%);
      color: var(--ink);
      font-family: "Space Grotesk", "Trebuchet MS", sans-serif;
      display: grid;
      place-items: center;
      padding: 32px 18px 48px;
    }

    .app {
      width: min(860px, 100%);
      background: var(--card);
      backdrop-filter: blur(12px);
      border-radius: 28px;
      box-shadow: var(--shadow);
      padding: 36px;
      display: grid;
      gap: 28px;
    }

    .view {
      display: none;
      gap: 24px;
    }

    .view.active {
      display: grid;
    }

    header {
      display: flex;
      flex-wrap: wrap;
      justify-content: space-between;
      align-items: center;
      gap: 12px;
    }

    h1 {
      font-family: "Fraunces", "Georgia", serif;
      font-weight: 600;
      font-size: clamp(2rem, 4vw, 2.8rem);
      margin: 0;
    }

    .subtitle {
      margin: 0;
      color: #5f5c57;
    }

    form {
      display: grid;
      gap: 12px;
    }

    input {
      border: 1px solid rgba(47, 72, 88, 0.2);
      border-radius: 14px;
      padding: 12px 14px;
      font: inherit;
    }

    .card {
      background: white;
      border-radius: 20px;
      padding: 24px;
      border: 2px solid rgba(47, 72, 88, 0.08);
      display: grid;
      gap: 10px;
    }

    .card.completed {
      border-color: var(--done);
    }

    .card h2 {
      margin: 0;
    }

    .reading {
      font-size: 1.15rem;
      line-height: 1.6;
      white-space: pre-wrap;
    }

    .bar {
      height: 10px;
      border-radius: 999px;
      background: rgba(47, 72, 88, 0.1);
      overflow: hidden;
    }

    .bar span {
      display: block;
      height: 100%;
      background: var(--accent);
    }

    .panel {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(150px, 1fr));
      gap: 16px;
    }

    .stat {
      background: white;
      border-radius: 18px;
      padding: 18px;
      border: 1px solid rgba(47, 72, 88, 0.08);
      display: grid;
      gap: 8px;
    }

    .stat .label {
      font-size: 0.85rem;
      text-transform: uppercase;
      letter-spacing: 0.12em;
      color: #8b857d;
    }

    .stat .value {
      font-size: 1.7rem;
      font-weight: 600;
      color: var(--accent-2);
    }

    .actions {
      display: flex;
      flex-wrap: wrap;
      gap: 12px;
    }

    button {
      appearance: none;
      border: none;
      border-radius: 999px;
      padding: 12px 18px;
      font-size: 1rem;
      font-weight: 600;
      cursor: pointer;
      background: var(--accent-2);
      color: white;
    }

    button:disabled {
      opacity: 0.4;
      cursor: default;
    }

    button.primary {
      background: var(--accent);
    }

    button.link {
      background: transparent;
      color: var(--accent-2);
      padding: 6px 0;
    }

    .status {
      font-size: 0.95rem;
      min-height: 1.2em;
      color: #6b645d;
    }

    .status[data-type="error"] {
      color: #c63b2b;
    }

    .settings {
      display: none;
      gap: 12px;
    }

    .settings.active {
      display: grid;
    }
  </style>
</head>
<body>
  <main class="app">
    <section id="authView" class="view {{AUTH_ACTIVE}}">
      <header>
        <h1>Daily Reader</h1>
      </header>
      <form id="loginForm">
        <p class="subtitle">Sign in to track your reading.</p>
        <input id="loginEmail" type="email" placeholder="Email" autocomplete="email" />
        <input id="loginPassword" type="password" placeholder="Password" autocomplete="current-password" />
        <button class="primary" type="submit">Sign in</button>
        <button class="link" type="button" id="showSignup">Create an account</button>
        <div id="loginError" class="status" data-type="error"></div>
      </form>
      <form id="signupForm" style="display: none">
        <p class="subtitle">Create an account.</p>
        <input id="signupEmail" type="email" placeholder="Email" autocomplete="email" />
        <input id="signupPassword" type="password" placeholder="Password" autocomplete="new-password" />
        <button class="primary" type="submit">Sign up</button>
        <button class="link" type="button" id="showLogin">I already have an account</button>
        <div id="signupError" class="status" data-type="error"></div>
      </form>
    </section>

    <section id="mainView" class="view {{MAIN_ACTIVE}}">
      <header>
        <h1>Daily Reader</h1>
        <div class="actions">
          <span id="userEmail" class="subtitle">{{EMAIL}}</span>
          <button class="link" type="button" id="openSettings">Settings</button>
          <button class="link" type="button" id="signOut">Sign out</button>
        </div>
      </header>

      <div id="readingCard" class="card">
        <h2 id="dayNumber">{{DAY_LABEL}}</h2>
        <p id="dateDisplay" class="subtitle">{{DATE}}</p>
        <div id="readingText" class="reading">{{READING}}</div>
        <div class="bar"><span id="progressFill" style="width: 0%"></span></div>
        <span id="progressPercent" class="subtitle"></span>
      </div>

      <div class="actions">
        <button type="button" id="prevBtn">Previous</button>
        <button type="button" id="todayBtn">Today</button>
        <button type="button" id="nextBtn">Next</button>
        <button class="primary" type="button" id="completeBtn">Mark as Complete</button>
      </div>

      <section class="panel">
        <div class="stat"><span class="label">Completed</span><span id="completedCount" class="value">0</span></div>
        <div class="stat"><span class="label">Remaining</span><span id="remainingCount" class="value">0</span></div>
        <div class="stat"><span class="label">Streak</span><span id="streakCount" class="value">0</span></div>
        <div class="stat"><span class="label">Overall</span><span id="completionPercent" class="value">0%</span></div>
      </section>
      <div class="bar"><span id="completionFill" style="width: 0%"></span></div>

      <section id="settings" class="settings">
        <label for="startDateInput">Plan start date</label>
        <input id="startDateInput" type="date" />
        <div class="actions">
          <button type="button" id="saveStartDate">Save start date</button>
          <button type="button" id="markPast">Mark all past days complete</button>
          <button class="link" type="button" id="closeSettings">Close</button>
        </div>
      </section>

      <div id="status" class="status"></div>
    </section>
  </main>

  <script>
    const $ = (id) => document.getElementById(id);
    const TOTAL_DAYS = 358;

    const api = async (method, path, body) => {
      const res = await fetch(path, {
        method,
        headers: body ? { 'content-type': 'application/json' } : {},
        body: body ? JSON.stringify(body) : undefined
      });
      if (!res.ok) {
        const err = new Error((await res.text()) || 'Request failed');
        err.status = res.status;
        throw err;
      }
      return res.status === 204 ? null : res.json();
    };

    const setStatus = (message, type) => {
      $('status').textContent = message || '';
      $('status').dataset.type = type || '';
    };

    const render = (view) => {
      const signedIn = view.status !== 'signed_out';
      $('authView').classList.toggle('active', !signedIn);
      $('mainView').classList.toggle('active', signedIn);
      $('userEmail').textContent = view.email || '';
      if (view.notice) setStatus(view.notice, 'error');

      if (view.day) {
        const day = view.day;
        $('dayNumber').textContent = `Day ${day.label} of ${TOTAL_DAYS}`;
        $('readingText').textContent = day.text;
        $('dateDisplay').textContent = day.date;
        $('progressFill').style.width = day.progress_percent + '%';
        $('progressPercent').textContent = day.progress_percent + '%';
        $('readingCard').classList.toggle('completed', day.completed);
        $('completeBtn').textContent = day.completed ? 'Mark as Incomplete' : 'Mark as Complete';
        $('prevBtn').disabled = !day.has_prev;
        $('nextBtn').disabled = !day.has_next;
      }

      if (view.stats) {
        $('completedCount').textContent = view.stats.completed;
        $('remainingCount').textContent = view.stats.remaining;
        $('streakCount').textContent = view.stats.streak;
        $('completionPercent').textContent = view.stats.completion_percent + '%';
        $('completionFill').style.width = view.stats.completion_percent + '%';
      }

      if (view.start_date) $('startDateInput').value = view.start_date;
      return view;
    };

    const refresh = async () => render(await api('GET', '/api/session'));

    const waitForSession = async (status) => {
      for (let i = 0; i < 50; i++) {
        const view = await refresh();
        if (view.status === status) return;
        await new Promise((resolve) => setTimeout(resolve, 100));
      }
    };

    const act = (fn) => () => fn().catch((err) => setStatus(err.message, 'error'));

    const auth = (path, emailId, passwordId, errorId) => async (event) => {
      event.preventDefault();
      try {
        await api('POST', path, { email: $(emailId).value, password: $(passwordId).value });
        $(errorId).textContent = '';
        await waitForSession('active');
      } catch (err) {
        $(errorId).textContent = err.message;
      }
    };

    $('loginForm').addEventListener('submit', auth('/api/auth/signin', 'loginEmail', 'loginPassword', 'loginError'));
    $('signupForm').addEventListener('submit', auth('/api/auth/signup', 'signupEmail', 'signupPassword', 'signupError'));

    $('showSignup').addEventListener('click', () => {
      $('loginForm').style.display = 'none';
      $('signupForm').style.display = 'grid';
    });
    $('showLogin').addEventListener('click', () => {
      $('signupForm').style.display = 'none';
      $('loginForm').style.display = 'grid';
    });

    $('signOut').addEventListener('click', act(async () => {
      await api('POST', '/api/auth/signout');
      await waitForSession('signed_out');
    }));

    $('prevBtn').addEventListener('click', act(async () => render(await api('POST', '/api/day/navigate', { delta: -1 }))));
    $('nextBtn').addEventListener('click', act(async () => render(await api('POST', '/api/day/navigate', { delta: 1 }))));
    $('todayBtn').addEventListener('click', act(async () => render(await api('POST', '/api/day/today'))));
    $('completeBtn').addEventListener('click', act(async () => {
      render(await api('POST', '/api/day/toggle'));
    }));

    $('openSettings').addEventListener('click', () => $('settings').classList.add('active'));
    $('closeSettings').addEventListener('click', () => $('settings').classList.remove('active'));

    $('saveStartDate').addEventListener('click', act(async () => {
      try {
        render(await api('POST', '/api/settings/start-date', { start_date: $('startDateInput').value }));
        $('settings').classList.remove('active');
      } catch (err) {
        if (err.status === 400) alert(err.message);
        else throw err;
      }
    }));

    $('markPast').addEventListener('click', act(async () => {
      const preview = await api('GET', '/api/settings/mark-past');
      if (!confirm(preview.message)) return;
      render(await api('POST', '/api/settings/mark-past', { confirm: true }));
      $('settings').classList.remove('active');
    }));

    refresh().catch((err) => setStatus(err.message, 'error'));
  </script>
</body>
</html>
"#;
