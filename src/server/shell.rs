//! Host page served at `/`. It frames the current map document, relays
//! runtime reports back to the server and shows a notice when the runtime
//! faulted.

const TOGGLE_CONTROLS: &str = r#"<div class="host-controls">
      <button type="button" data-toggle="/toggles/heatmap">Toggle heatmap</button>
      <button type="button" data-toggle="/toggles/live-conditions">Toggle live conditions</button>
    </div>"#;

const SHELL_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>Pilgrimage map preview</title>
    <style>
      body { margin: 0; font-family: sans-serif; background: #f4f1ea; }
      .host-controls, .focus-controls { display: flex; flex-wrap: wrap; gap: 8px; padding: 8px 12px; }
      #map-frame { border: 0; display: block; width: __WIDTH__px; height: __HEIGHT__px; }
      #fallback { padding: 16px; color: #7a1f1f; background: #fbe9e7; }
    </style>
  </head>
  <body>
    __TOGGLE_CONTROLS__
    <div class="focus-controls" id="focus-controls"></div>
    <p id="fallback" hidden></p>
    <iframe id="map-frame" title="Pilgrimage map" sandbox="allow-scripts" src="/map?revision=0"></iframe>
    <script>
      (function () {
        var frame = document.getElementById('map-frame');
        var notice = document.getElementById('fallback');
        var revision = 0;
        var frameLoaded = false;
        var pending = [];

        function send(path, body) {
          return fetch(path, {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify(body || {})
          });
        }

        function deliver(message) {
          if (frameLoaded && frame.contentWindow) {
            frame.contentWindow.postMessage(message, '*');
          } else {
            pending.push(message);
          }
        }

        frame.addEventListener('load', function () {
          frameLoaded = true;
          var queued = pending;
          pending = [];
          queued.forEach(deliver);
        });

        window.addEventListener('message', function (event) {
          if (event.source !== frame.contentWindow || !event.data) {
            return;
          }
          send('/embedded', event.data);
        });

        document.querySelectorAll('[data-toggle]').forEach(function (button) {
          button.addEventListener('click', function () {
            send(button.getAttribute('data-toggle')).then(poll);
          });
        });

        fetch('/pois').then(function (response) {
          return response.json();
        }).then(function (points) {
          var container = document.getElementById('focus-controls');
          points.forEach(function (point) {
            var button = document.createElement('button');
            button.type = 'button';
            button.textContent = point.label;
            button.addEventListener('click', function () {
              send('/focus', { id: point.id }).then(poll);
            });
            container.appendChild(button);
          });
        }).catch(function () {});

        function poll() {
          fetch('/surface').then(function (response) {
            return response.json();
          }).then(function (surface) {
            if (surface.revision !== revision) {
              revision = surface.revision;
              frameLoaded = false;
              pending = [];
              frame.src = '/map?revision=' + revision;
            }
            notice.hidden = !surface.fault;
            notice.textContent = surface.fault ? 'The map could not be shown: ' + surface.fault : '';
            surface.messages.forEach(deliver);
          }).catch(function () {});
        }

        setInterval(poll, __POLL_INTERVAL_MS__);
        poll();
      })();
    </script>
  </body>
</html>
"#;

const POLL_INTERVAL_MS: u32 = 1000;

pub(super) fn render_shell(show_toggle_controls: bool, width: u32, height: u32) -> String {
    let controls = if show_toggle_controls {
        TOGGLE_CONTROLS
    } else {
        ""
    };

    SHELL_TEMPLATE
        .replace("__TOGGLE_CONTROLS__", controls)
        .replace("__WIDTH__", &width.to_string())
        .replace("__HEIGHT__", &height.to_string())
        .replace("__POLL_INTERVAL_MS__", &POLL_INTERVAL_MS.to_string())
}
