use crate::camera::DeviceLimits;
use crate::settings::CameraSettings;

pub fn login_page() -> String {
    r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Camview Login</title>
    <style>
        body { font-family: sans-serif; display: flex; justify-content: center; margin-top: 15vh; }
        form { display: flex; flex-direction: column; gap: 8px; width: 240px; }
    </style>
</head>
<body>
    <form method="post" action="/login">
        <h2>Camview</h2>
        <input name="username" placeholder="Username" autocomplete="username">
        <input name="password" type="password" placeholder="Password" autocomplete="current-password">
        <button type="submit">Log in</button>
    </form>
</body>
</html>
"#
    .to_string()
}

/// Control page with the live stream, settings form and status readout
pub fn control_page(settings: &CameraSettings, limits: &DeviceLimits) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Camview</title>
    <style>
        body {{ font-family: sans-serif; margin: 16px; }}
        .layout {{ display: flex; gap: 24px; flex-wrap: wrap; }}
        img.stream {{ max-width: 100%; background: #000; }}
        form {{ display: grid; grid-template-columns: auto 1fr; gap: 8px 12px; align-items: center; }}
        #status {{ font-family: monospace; }}
    </style>
</head>
<body>
    <div class="layout">
        <img class="stream" src="/video_feed" alt="Live stream">
        <div>
            <form id="controls">
                <label for="exposure">Exposure (ms)</label>
                <input id="exposure" name="exposure" type="number" step="0.001"
                       min="{exposure_min}" max="{exposure_max}" value="{exposure}">
                <label for="gain">Gain ({gain_min} - {gain_max})</label>
                <input id="gain" name="gain" type="range" step="0.1"
                       min="{gain_min}" max="{gain_max}" value="{gain}">
                <label for="triggered">Trigger mode</label>
                <select id="triggered" name="triggered">
                    <option value="false"{trigger_off}>Off</option>
                    <option value="true"{trigger_on}>On</option>
                </select>
                <label for="count_trigger">Threshold gate</label>
                <input id="count_trigger" name="count_trigger" type="checkbox"{gate_checked}>
                <label for="threshold">Threshold</label>
                <input id="threshold" name="threshold" type="number" min="0" max="255" value="{threshold}">
                <span></span>
                <button type="submit">Apply</button>
            </form>
            <p id="status">max: N/A, mean: N/A</p>
            <p><a href="/logout">Log out</a></p>
        </div>
    </div>
    <script>
        const form = document.getElementById('controls');
        form.addEventListener('submit', (ev) => {{
            ev.preventDefault();
            fetch('/camera_control', {{ method: 'POST', body: new URLSearchParams(new FormData(form)) }});
        }});
        setInterval(async () => {{
            const res = await fetch('/camera_status');
            if (!res.ok) return;
            const s = await res.json();
            document.getElementById('status').textContent = `max: ${{s.max_count}}, mean: ${{s.mean_count}}`;
        }}, 1000);
        const ws = new WebSocket((location.protocol === 'https:' ? 'wss://' : 'ws://') + location.host + '/ws');
        ws.onmessage = (ev) => {{
            const msg = JSON.parse(ev.data);
            if (msg.event !== 'update_settings') return;
            const d = msg.data;
            document.getElementById('exposure').value = d.exposure;
            document.getElementById('gain').value = d.gain;
            document.getElementById('triggered').value = d.triggered ? 'true' : 'false';
            document.getElementById('count_trigger').checked = d.count_trigger;
            document.getElementById('threshold').value = d.threshold;
        }};
    </script>
</body>
</html>
"#,
        exposure_min = limits.exposure_min_ms(),
        exposure_max = limits.exposure_max_ms(),
        exposure = settings.exposure_ms,
        gain_min = limits.gain_min,
        gain_max = limits.gain_max,
        gain = settings.gain,
        trigger_off = if settings.trigger_enabled { "" } else { " selected" },
        trigger_on = if settings.trigger_enabled { " selected" } else { "" },
        gate_checked = if settings.threshold_gate_enabled {
            " checked"
        } else {
            ""
        },
        threshold = settings.threshold,
    )
}
