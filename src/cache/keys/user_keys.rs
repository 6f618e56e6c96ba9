/// 按 ID 缓存的用户键前缀
const USER_ID_PREFIX: &str = "user:";

/// 按邮箱缓存的用户键前缀
const USER_EMAIL_PREFIX: &str = "user:email:";

/// 全部用户列表的缓存键
pub const ALL_USERS_KEY: &str = "users:all";

pub fn user_id_key(user_id: &str) -> String {
    format!("{}{}", USER_ID_PREFIX, user_id)
}

pub fn user_email_key(email: &str) -> String {
    format!("{}{}", USER_EMAIL_PREFIX, email)
}

/// 同一用户派生出的所有缓存键，写操作后必须全部失效
pub fn user_key_family<'a>(user_id: &str, emails: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut keys = vec![user_id_key(user_id)];
    for email in emails {
        let key = user_email_key(email);
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys.push(ALL_USERS_KEY.to_string());
    keys
}
