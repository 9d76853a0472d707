//! C ABI entry points (spec §6), for host-language bindings that cannot
//! link `rusqlite` directly. Every function that can fail follows the
//! convention spec §6 names: a non-null `*mut c_char` pointer; on success, a
//! null-terminated non-empty string; on failure, a zero byte followed by a
//! null-terminated error message. A leading zero byte cannot occur in a
//! successful result (the SQL generators never produce empty SQL), so the
//! caller only needs to check `*ptr == 0`. Because the failure form embeds a
//! zero byte before the end of the buffer, these strings are not
//! `CString`-representable (`CString::new` rejects interior nul bytes) —
//! they are built and freed as raw byte buffers instead, via [`leak_bytes`]
//! and [`genomicsqlite_free`].

use std::ffi::CStr;
#[cfg(test)]
use std::ffi::CString;
use std::os::raw::c_char;

use rusqlite::Connection;

use crate::config::GenomicSqliteConfig;
use crate::gri::{query, schema};
use crate::refseq;

unsafe fn read_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(str::to_string)
}

/// Leak a byte buffer to the host as a `*mut c_char`, appending the final
/// nul terminator here so callers never have to remember it. Paired with
/// [`genomicsqlite_free`], which recovers the original length by scanning
/// for that terminator (accounting for a possible leading zero byte).
fn leak_bytes(mut bytes: Vec<u8>) -> *mut c_char {
    bytes.push(0);
    let boxed = bytes.into_boxed_slice();
    // `Box::into_raw` on a slice yields a fat pointer; the C ABI only has
    // room for the thin data pointer, so the length is dropped here and
    // recovered by scanning for the terminator in `genomicsqlite_free`.
    Box::into_raw(boxed) as *mut u8 as *mut c_char
}

fn leak(s: String) -> *mut c_char {
    leak_bytes(s.into_bytes())
}

/// Spec §6's C ABI result convention: the plain string on success, or a
/// leading zero byte followed by the error message on failure.
fn leak_result(result: crate::error::Result<String>) -> *mut c_char {
    match result {
        Ok(sql) => leak_bytes(sql.into_bytes()),
        Err(err) => {
            let mut bytes = vec![0u8];
            bytes.extend(err.to_string().into_bytes());
            leak_bytes(bytes)
        }
    }
}

/// Release a string previously returned by one of this module's functions.
///
/// # Safety
/// `ptr` must have been returned by a function in this module and not
/// already freed.
#[no_mangle]
pub unsafe extern "C" fn genomicsqlite_free(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    let byte_ptr = ptr as *mut u8;
    let total_len = if *byte_ptr == 0 {
        1 + CStr::from_ptr(ptr.add(1)).to_bytes_with_nul().len()
    } else {
        CStr::from_ptr(ptr).to_bytes_with_nul().len()
    };
    let slice_ptr = std::slice::from_raw_parts_mut(byte_ptr, total_len) as *mut [u8];
    drop(Box::from_raw(slice_ptr));
}

/// `genomicsqlite_version()` (spec §6).
#[no_mangle]
pub extern "C" fn genomicsqlite_version() -> *mut c_char {
    leak(crate::VERSION.to_string())
}

/// `genomicsqlite_default_config_json()` (spec §6).
#[no_mangle]
pub extern "C" fn genomicsqlite_default_config_json() -> *mut c_char {
    leak(crate::config::default_config_json())
}

/// `create_genomic_range_index_sql(table, rid_col, beg_expr, end_expr,
/// max_depth)` over an opaque `rusqlite::Connection` pointer already held by
/// the host process.
///
/// # Safety
/// `conn` must be a live pointer obtained from [`genomicsqlite_open`] (or
/// cast from an existing `&Connection` by the caller); the `*const c_char`
/// arguments must be valid, nul-terminated C strings (or null, to signal
/// "use default").
#[no_mangle]
pub unsafe extern "C" fn create_genomic_range_index_sql(
    conn: *const Connection,
    table: *const c_char,
    rid_col: *const c_char,
    beg_expr: *const c_char,
    end_expr: *const c_char,
    max_depth: i64,
) -> *mut c_char {
    if conn.is_null() {
        return leak_result(Err(crate::error::GenomicSqliteError::InvalidArgument(
            "null connection".to_string(),
        )));
    }
    let (Some(table), Some(rid_col), Some(beg_expr), Some(end_expr)) = (
        read_str(table),
        read_str(rid_col),
        read_str(beg_expr),
        read_str(end_expr),
    ) else {
        return leak_result(Err(crate::error::GenomicSqliteError::InvalidArgument(
            "missing required string argument".to_string(),
        )));
    };
    let result = schema::create_genomic_range_index_sql(
        &*conn, &table, &rid_col, &beg_expr, &end_expr, max_depth,
    );
    leak_result(result)
}

/// `genomic_range_rowids_sql(table, handle_or_null, qrid, qbeg, qend)` (spec
/// §6). `optimize` toggles whether write-sensitive level statistics are
/// read through `conn` (nonzero) or the safe, statistics-free form is
/// emitted (zero).
///
/// # Safety
/// Same pointer-validity requirements as [`create_genomic_range_index_sql`].
#[no_mangle]
pub unsafe extern "C" fn genomic_range_rowids_sql(
    conn: *const Connection,
    table: *const c_char,
    optimize: i32,
    qrid_expr: *const c_char,
    qbeg_expr: *const c_char,
    qend_expr: *const c_char,
) -> *mut c_char {
    if conn.is_null() {
        return leak_result(Err(crate::error::GenomicSqliteError::InvalidArgument(
            "null connection".to_string(),
        )));
    }
    let (Some(table), Some(qrid_expr), Some(qbeg_expr), Some(qend_expr)) = (
        read_str(table),
        read_str(qrid_expr),
        read_str(qbeg_expr),
        read_str(qend_expr),
    ) else {
        return leak_result(Err(crate::error::GenomicSqliteError::InvalidArgument(
            "missing required string argument".to_string(),
        )));
    };
    let conn_ref = &*conn;
    let optimize_conn = if optimize != 0 { Some(conn_ref) } else { None };
    let result = query::genomic_range_rowids_sql(
        conn_ref,
        &table,
        optimize_conn,
        &qrid_expr,
        &qbeg_expr,
        &qend_expr,
    );
    leak_result(result)
}

/// `put_genomic_reference_assembly_sql(assembly, schema)` (spec §6).
///
/// # Safety
/// `assembly` must be a valid nul-terminated C string; `schema` may be
/// null to mean "no ATTACHed schema prefix".
#[no_mangle]
pub unsafe extern "C" fn put_genomic_reference_assembly_sql(
    assembly: *const c_char,
    schema: *const c_char,
) -> *mut c_char {
    let Some(assembly) = read_str(assembly) else {
        return leak_result(Err(crate::error::GenomicSqliteError::InvalidArgument(
            "missing assembly".to_string(),
        )));
    };
    let schema = read_str(schema);
    leak_result(Ok(refseq::put_reference_assembly_sql(
        &assembly,
        schema.as_deref(),
    )))
}

/// `put_genomic_reference_sequence_sql(name, length, assembly, refget_id,
/// meta_json, rid, schema)` (spec §6). `rid < 0` auto-assigns. Optional
/// string arguments (`assembly`, `refget_id`, `meta_json`, `schema`) accept
/// null for "absent".
///
/// # Safety
/// `name` must be a valid nul-terminated C string; the remaining
/// `*const c_char` arguments may be null.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn put_genomic_reference_sequence_sql(
    name: *const c_char,
    length: i64,
    assembly: *const c_char,
    refget_id: *const c_char,
    meta_json: *const c_char,
    rid: i64,
    schema: *const c_char,
) -> *mut c_char {
    let Some(name) = read_str(name) else {
        return leak_result(Err(crate::error::GenomicSqliteError::InvalidArgument(
            "missing name".to_string(),
        )));
    };
    let assembly = read_str(assembly);
    let refget_id = read_str(refget_id);
    let meta_json = read_str(meta_json);
    let schema = read_str(schema);
    leak_result(Ok(refseq::put_reference_sequence_sql(
        &name,
        length,
        assembly.as_deref(),
        refget_id.as_deref(),
        meta_json.as_deref(),
        rid,
        schema.as_deref(),
    )))
}

/// `genomicsqlite_open(path, config_json)` (spec §6): opens a tuned
/// connection and leaks it to the host process as an opaque pointer. The
/// host must eventually pass the pointer to [`genomicsqlite_close`].
///
/// # Safety
/// `path` must be a valid nul-terminated C string; `config_json` may be
/// null to mean "use defaults".
#[no_mangle]
pub unsafe extern "C" fn genomicsqlite_open(
    path: *const c_char,
    config_json: *const c_char,
) -> *mut Connection {
    let Some(path) = read_str(path) else {
        return std::ptr::null_mut();
    };
    let config = match read_str(config_json) {
        Some(json) => match serde_json::from_str::<serde_json::Value>(&json) {
            Ok(value) => GenomicSqliteConfig::merged(&value),
            Err(_) => return std::ptr::null_mut(),
        },
        None => GenomicSqliteConfig::default(),
    };
    match crate::conn::open(path, &config) {
        Ok(conn) => Box::into_raw(Box::new(conn)),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Release a connection returned by [`genomicsqlite_open`].
///
/// # Safety
/// `conn` must have been returned by [`genomicsqlite_open`] and not already
/// closed.
#[no_mangle]
pub unsafe extern "C" fn genomicsqlite_close(conn: *mut Connection) {
    if !conn.is_null() {
        drop(Box::from_raw(conn));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_round_trips_through_the_c_abi() {
        let ptr = genomicsqlite_version();
        let s = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        assert_eq!(s, crate::VERSION);
        unsafe { genomicsqlite_free(ptr) };
    }

    #[test]
    fn open_and_close_round_trip() {
        let path = CString::new(":memory:").unwrap();
        let conn = unsafe { genomicsqlite_open(path.as_ptr(), std::ptr::null()) };
        assert!(!conn.is_null());
        unsafe { genomicsqlite_close(conn) };
    }

    #[test]
    fn rowids_sql_reports_missing_index_with_zero_byte_prefix() {
        let path = CString::new(":memory:").unwrap();
        let conn = unsafe { genomicsqlite_open(path.as_ptr(), std::ptr::null()) };
        unsafe {
            (*conn)
                .execute_batch("CREATE TABLE reads (rid INTEGER, beg INTEGER, end INTEGER);")
                .unwrap();
        }
        let table = CString::new("reads").unwrap();
        let q1 = CString::new("?1").unwrap();
        let q2 = CString::new("?2").unwrap();
        let q3 = CString::new("?3").unwrap();
        let result = unsafe {
            genomic_range_rowids_sql(
                conn,
                table.as_ptr(),
                1,
                q1.as_ptr(),
                q2.as_ptr(),
                q3.as_ptr(),
            )
        };
        let first_byte = unsafe { *(result as *const u8) };
        assert_eq!(first_byte, 0u8);
        let message = unsafe { CStr::from_ptr(result.add(1)) }.to_str().unwrap();
        assert!(!message.is_empty());
        unsafe {
            genomicsqlite_free(result);
            genomicsqlite_close(conn);
        }
    }
}
