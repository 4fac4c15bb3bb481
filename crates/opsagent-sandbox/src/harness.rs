//! Generation of the Python execution harness.
//!
//! The harness is a host-generated, trusted prologue that runs the
//! (already validated) agent code under `python -I`:
//!
//! - `__builtins__` is replaced with an explicit whitelist; the import
//!   hook only admits allowlisted module roots.
//! - Each registered tool becomes a callable that proxies the call back
//!   to the host as a line-delimited JSON record on stdout, then blocks
//!   on stdin for the response.
//! - Protocol records are prefixed with a per-invocation nonce marker so
//!   ordinary `print` output can never be mistaken for protocol traffic.
//! - Any exception escaping the agent code is converted into a
//!   structured exit record instead of an interpreter crash.
//!
//! The agent code itself is passed as a separate file (argv[1]); it is
//! never interpolated into the harness source, so no escaping of
//! model-produced text is involved.

/// Builtin names exposed to agent code. Everything else — `open`,
/// `getattr`, `globals`, `eval`, … — is absent from the namespace.
pub const SAFE_BUILTINS: &[&str] = &[
    "abs",
    "all",
    "any",
    "bin",
    "bool",
    "bytearray",
    "bytes",
    "chr",
    "dict",
    "divmod",
    "enumerate",
    "filter",
    "float",
    "format",
    "frozenset",
    "hash",
    "hex",
    "int",
    "isinstance",
    "issubclass",
    "iter",
    "len",
    "list",
    "map",
    "max",
    "min",
    "next",
    "oct",
    "ord",
    "pow",
    "print",
    "range",
    "repr",
    "reversed",
    "round",
    "set",
    "slice",
    "sorted",
    "str",
    "sum",
    "tuple",
    "zip",
    // Exception types, so agent code can raise and catch normally.
    "BaseException",
    "Exception",
    "ArithmeticError",
    "AttributeError",
    "IndexError",
    "KeyError",
    "LookupError",
    "NameError",
    "NotImplementedError",
    "OverflowError",
    "RuntimeError",
    "StopIteration",
    "TypeError",
    "ValueError",
    "ZeroDivisionError",
];

/// Maximum characters of the `result` variable's repr carried back.
const RESULT_REPR_LIMIT: usize = 2000;

/// A tool name is only bridged if it is a valid Python identifier, since
/// it becomes a function name in the execution namespace.
pub fn is_valid_tool_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Generate the harness source for one invocation.
///
/// `marker` is the per-invocation protocol nonce; `tool_names` are the
/// registry names to expose (invalid identifiers are skipped with a
/// warning); `allowed_modules` feeds the runtime import hook, mirroring
/// the static allowlist.
pub fn generate_harness(tool_names: &[String], allowed_modules: &[String], marker: &str) -> String {
    let bridged: Vec<&String> = tool_names
        .iter()
        .filter(|n| {
            let ok = is_valid_tool_identifier(n);
            if !ok {
                tracing::warn!("Tool '{}' is not a valid identifier, not bridged", n);
            }
            ok
        })
        .collect();

    // JSON literals double as Python literals for these shapes.
    let marker_lit = serde_json::to_string(marker).expect("marker serializes");
    let modules_lit =
        serde_json::to_string(allowed_modules).expect("module list serializes");
    let tools_lit = serde_json::to_string(&bridged).expect("tool list serializes");
    let builtins_lit = serde_json::to_string(SAFE_BUILTINS).expect("builtin list serializes");

    format!(
        r#"# Generated execution harness; not agent code.
import builtins as _builtins
import importlib as _importlib
import json as _json
import sys as _sys

_MARKER = {marker_lit}
_STDIN = _sys.stdin
_STDOUT = _sys.stdout
_ALLOWED_MODULES = set({modules_lit})
_SAFE_BUILTIN_NAMES = {builtins_lit}
_TOOL_NAMES = {tools_lit}


def _guarded_import(name, globals=None, locals=None, fromlist=(), level=0):
    root = name.split(".")[0]
    if level != 0 or root not in _ALLOWED_MODULES:
        raise ImportError("import of module '%s' is not permitted" % name)
    return _importlib.__import__(name, globals, locals, fromlist, level)


def _emit(record):
    _STDOUT.write(_MARKER + _json.dumps(record) + "\n")
    _STDOUT.flush()


def _tool_call(name, kwargs):
    _emit({{"op": "tool_call", "name": name, "arguments": kwargs}})
    line = _STDIN.readline()
    if not line:
        raise RuntimeError("tool bridge closed")
    resp = _json.loads(line)
    if not resp.get("ok"):
        raise RuntimeError(resp.get("error") or "tool call failed")
    return resp.get("result")


def _make_tool(name):
    def _proxy(**kwargs):
        return _tool_call(name, kwargs)

    _proxy.__name__ = name
    return _proxy


def _main():
    with open(_sys.argv[1], "r", encoding="utf-8") as f:
        code = f.read()

    safe = {{}}
    for name in _SAFE_BUILTIN_NAMES:
        if hasattr(_builtins, name):
            safe[name] = getattr(_builtins, name)
    safe["__import__"] = _guarded_import

    namespace = {{"__builtins__": safe, "__name__": "__main__"}}
    for tool in _TOOL_NAMES:
        namespace[tool] = _make_tool(tool)

    try:
        exec(compile(code, "<agent-code>", "exec"), namespace)
    except BaseException as e:
        _emit({{"op": "exit", "ok": False,
               "error": "%s: %s" % (type(e).__name__, e)}})
        return
    value = namespace.get("result")
    _emit({{"op": "exit", "ok": True,
           "value": None if value is None else repr(value)[:{result_limit}]}})


_main()
"#,
        marker_lit = marker_lit,
        modules_lit = modules_lit,
        builtins_lit = builtins_lit,
        tools_lit = tools_lit,
        result_limit = RESULT_REPR_LIMIT,
    )
}
