use crate::view::NamespaceView;

/// The runnable client module a sandbox subprocess imports. Calls marshal
/// `{method, args, id}` over the duplex channel and resolve against the
/// matching `{result|error, id}` reply. A single in-flight connect
/// promise is shared across every namespace/function binding so a burst
/// of parallel first-use calls opens exactly one channel instead of
/// racing on "who connects first". The
/// connection is reference-counted: every call acquires it, and the
/// socket only closes 100ms after the last in-flight call releases, so
/// back-to-back batches reuse the channel instead of churning it.
pub fn build_client_module(namespaces: &[NamespaceView], endpoint_url: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "const ENDPOINT_URL = \"{endpoint_url}\";\n\n"
    ));
    out.push_str(CONNECTION_PRELUDE);
    out.push_str("\nexport const tools = {\n");
    for ns in namespaces {
        out.push_str(&format!("  {}: {{\n", ns.name));
        for f in &ns.functions {
            out.push_str(&format!(
                "    async {}(args) {{ return callRpc(\"{}.{}\", args); }},\n",
                f.name, ns.name, f.name
            ));
        }
        out.push_str("  },\n");
    }
    out.push_str("};\n");
    out
}

const CONNECTION_PRELUDE: &str = r#"
let connectionPromise = null;
let socket = null;
let activeCalls = 0;
let disconnectTimer = null;
const pending = new Map();
let nextId = 0;

function acquire() {
  activeCalls += 1;
  if (disconnectTimer !== null) {
    clearTimeout(disconnectTimer);
    disconnectTimer = null;
  }
  if (connectionPromise) return connectionPromise;
  connectionPromise = new Promise((resolve, reject) => {
    const ws = new WebSocket(ENDPOINT_URL);
    ws.addEventListener("open", () => {
      socket = ws;
      resolve(ws);
    });
    ws.addEventListener("error", () => reject(new Error("WebSocket disconnected")));
    ws.addEventListener("close", () => {
      socket = null;
      connectionPromise = null;
      for (const [, entry] of pending) {
        entry.reject(new Error("WebSocket disconnected"));
      }
      pending.clear();
    });
    ws.addEventListener("message", (event) => {
      const frame = JSON.parse(event.data);
      if (frame.id === undefined) return;
      const entry = pending.get(frame.id);
      if (!entry) return;
      pending.delete(frame.id);
      if (frame.error !== undefined) {
        entry.reject(new Error(frame.error));
      } else {
        entry.resolve(frame.result);
      }
    });
  });
  return connectionPromise;
}

function release() {
  activeCalls -= 1;
  if (activeCalls > 0) return;
  disconnectTimer = setTimeout(() => {
    disconnectTimer = null;
    const ws = socket;
    socket = null;
    connectionPromise = null;
    if (ws) ws.close();
  }, 100);
}

async function callRpc(method, args) {
  const ws = await acquire();
  const id = String(nextId++);
  try {
    return await new Promise((resolve, reject) => {
      const timeout = setTimeout(() => {
        pending.delete(id);
        reject(new Error(`RPC timeout: ${method}`));
      }, 30000);
      pending.set(id, {
        resolve: (value) => {
          clearTimeout(timeout);
          resolve(value);
        },
        reject: (err) => {
          clearTimeout(timeout);
          reject(err);
        },
      });
      ws.send(JSON.stringify({ method, args, id }));
    });
  } finally {
    release();
  }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::FunctionView;

    #[test]
    fn emits_one_binding_per_function() {
        let namespaces = vec![NamespaceView {
            name: "file".into(),
            functions: vec![FunctionView {
                name: "add".into(),
                args_type: "AddArgs".into(),
                return_type: "number".into(),
                is_async: false,
                description: None,
            }],
            ..Default::default()
        }];
        let module = build_client_module(&namespaces, "ws://localhost:9000/client");
        assert!(module.contains("file.add"));
        assert!(module.contains("async add(args)"));
    }

    #[test]
    fn shares_a_single_connect_promise() {
        let module = build_client_module(&[], "ws://localhost:9000/client");
        assert!(module.contains("let connectionPromise = null;"));
        assert_eq!(module.matches("function acquire()").count(), 1);
    }

    #[test]
    fn releases_the_connection_after_a_hundred_millis_idle() {
        let module = build_client_module(&[], "ws://localhost:9000/client");
        assert!(module.contains("function release()"));
        assert!(module.contains("}, 100);"));
    }
}
