//! Browser client runtime served at [`CLIENT_PATH`](crate::CLIENT_PATH).

/// Connects to the update endpoint and applies messages:
/// `full-reload` reloads the page, `js-update` re-imports the module with a
/// cache-busting timestamp, `css-update` refreshes matching `<link>` tags or
/// re-imports the stylesheet module.
pub const CLIENT_RUNTIME: &str = r#"// devserve client runtime
const socketUrl = `${location.protocol === 'https:' ? 'wss' : 'ws'}://${location.host}/@devserve/ws`;

function withTimestamp(url, timestamp) {
  const [path, query] = url.split('?');
  const params = new URLSearchParams(query);
  params.set('t', String(timestamp));
  return `${path}?${params}`;
}

async function applyUpdate(update) {
  const url = `/${update.file}`;
  if (update.type === 'css-update') {
    const links = document.querySelectorAll(`link[rel="stylesheet"][href^="${url}"]`);
    if (links.length > 0) {
      links.forEach((link) => {
        link.href = withTimestamp(url, update.timestamp);
      });
      return;
    }
    await import(withTimestamp(`${url}?import`, update.timestamp));
    return;
  }
  await import(withTimestamp(url, update.timestamp));
}

function connect() {
  const socket = new WebSocket(socketUrl);

  socket.addEventListener('open', () => {
    console.debug('[devserve] connected');
  });

  socket.addEventListener('message', async ({ data }) => {
    const message = JSON.parse(data);
    switch (message.type) {
      case 'full-reload':
        console.debug(`[devserve] ${message.path} changed, reloading`);
        location.reload();
        break;
      case 'update':
        for (const update of message.updates) {
          try {
            await applyUpdate(update);
            console.debug(`[devserve] updated ${update.file}`);
          } catch (err) {
            console.error(`[devserve] failed to update ${update.file}`, err);
          }
        }
        break;
    }
  });

  socket.addEventListener('close', () => {
    console.debug('[devserve] server connection lost, retrying');
    setTimeout(connect, 1000);
  });
}

connect();
"#;
