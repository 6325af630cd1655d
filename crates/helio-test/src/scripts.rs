//! Shell bodies for fake engine scripts.
//!
//! Each script runs as `sh <script> <args...>`.

/// Prints its last argument (the payload for positional commands).
pub const ECHO_LAST_ARG: &str = r#"for last; do :; done
printf '%s\n' "$last"
"#;

/// Copies stdin to stdout.
pub const ECHO_STDIN: &str = "cat\n";

/// Prints the contents of the request file named by its last argument.
pub const ECHO_REQUEST_FILE: &str = r#"for last; do :; done
cat "$last"
"#;

/// Prints `HELIO_REGION` from its environment and its working directory
/// as a JSON object.
pub const ECHO_ENVIRONMENT: &str = r#"printf '{"region":"%s","cwd":"%s"}\n' "$HELIO_REGION" "$(pwd -P)"
"#;

/// Writes the request file path to `request.path` next to the script, then
/// prints the file's contents.
pub const RECORD_REQUEST_FILE: &str = r#"for last; do :; done
printf '%s' "$last" > "$(dirname "$0")/request.path"
cat "$last"
"#;

/// Exits 7 with `boom` on stderr.
pub const FAIL_BOOM: &str = r#"echo "partial output"
echo boom >&2
exit 7
"#;

/// Records the request file path, then fails.
pub const RECORD_AND_FAIL: &str = r#"for last; do :; done
printf '%s' "$last" > "$(dirname "$0")/request.path"
echo "calculation failed" >&2
exit 1
"#;

/// Starts a long sleep, records its pid in `engine.pid` and the request
/// path (if any) in `request.path`, then waits.
pub const HANG: &str = r#"for last; do :; done
printf '%s' "$last" > "$(dirname "$0")/request.path"
sleep 30 &
echo $! > "$(dirname "$0")/engine.pid"
wait
"#;

/// Prints something that is not JSON.
pub const NOT_JSON: &str = r#"echo "Traceback (most recent call last):"
echo "  KeyError: 'module_quantity'"
"#;

/// Catalog engine answering `get_pv_manufacturers`.
pub const CATALOG: &str = r#"case "$1" in
  get_pv_manufacturers) echo '["Brand A","Brand B"]' ;;
  get_pv_models) printf '["%s X1","%s X2"]\n' "$2" "$2" ;;
  *) echo "unknown command: $1" >&2; exit 2 ;;
esac
"#;

/// Calculation engine: answers `{"anlage_kwp":8.0}` for a request file
/// containing `"module_quantity":20`.
pub const CALCULATION: &str = r#"if grep -q '"module_quantity":20' "$1"; then
  echo '{"anlage_kwp":8.0}'
else
  echo "unexpected request: $(cat "$1")" >&2
  exit 1
fi
"#;

/// Product database engine replying with `{success, data, error}`.
pub const PRODUCTS: &str = r#"case "$1" in
  get_product_by_model)
    case "$2" in
      --model=X1) echo '{"success": true, "data": {"id": 1, "model": "X1"}}' ;;
      *) echo '{"success": false, "error": "Product not found"}' ;;
    esac ;;
  list_categories) echo '{"success": true, "data": ["Modul", "Wechselrichter"]}' ;;
  *) echo '{"data": []}' ;;
esac
"#;

/// Document engine printing the generated file path.
pub const DOCUMENT: &str = r#"echo "$(dirname "$1")/offer.pdf"
"#;
