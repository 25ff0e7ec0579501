// Environment variable utils

use std::env;

/// Gets boolean env var
///
/// Accepts 'YES'/'TRUE' and 'NO'/'FALSE' (case insensitive);
/// any other value falls back to default_val
///
/// # Arguments
///
/// * `var_name` - The name of the environment variable
/// * `default_val` - The default value
pub fn get_env_bool(var_name: &str, default_val: bool) -> bool {
    env::var(var_name)
        .ok()
        .and_then(|v| match v.to_uppercase().as_str() {
            "YES" | "TRUE" => Some(true),
            "NO" | "FALSE" => Some(false),
            _ => None,
        })
        .unwrap_or(default_val)
}

/// Gets string env var
///
/// # Arguments
///
/// * `var_name` - The name of the environment variable
/// * `default_val` - The default value, used if the variable is not set
pub fn get_env_string(var_name: &str, default_val: &str) -> String {
    env::var(var_name).unwrap_or_else(|_| default_val.to_string())
}

/// Gets u32 env var
///
/// # Arguments
///
/// * `var_name` - The name of the environment variable
/// * `default_val` - The default value, used if the variable is not set or invalid
pub fn get_env_u32(var_name: &str, default_val: u32) -> u32 {
    env::var(var_name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_val)
}

// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_vars() {
        env::set_var("TEST_RTMP_ENV_BOOL", "YES");
        env::set_var("TEST_RTMP_ENV_STR", "value");
        env::set_var("TEST_RTMP_ENV_U32", "1935");
        env::set_var("TEST_RTMP_ENV_BAD_U32", "not-a-number");

        assert!(get_env_bool("TEST_RTMP_ENV_BOOL", false));
        assert!(!get_env_bool("TEST_RTMP_ENV_STR", false));
        assert!(get_env_bool("TEST_RTMP_ENV_MISSING", true));

        assert_eq!(get_env_string("TEST_RTMP_ENV_STR", "default"), "value");
        assert_eq!(get_env_string("TEST_RTMP_ENV_MISSING", "default"), "default");

        assert_eq!(get_env_u32("TEST_RTMP_ENV_U32", 0), 1935);
        assert_eq!(get_env_u32("TEST_RTMP_ENV_BAD_U32", 7), 7);
        assert_eq!(get_env_u32("TEST_RTMP_ENV_MISSING", 7), 7);
    }
}
