//! Schema definition for the in-app message table.

/// Schema definition for message state tables.
pub struct MessageSchema {
    pub version: usize,
    pub up: &'static str,
}

pub const MESSAGE_VERSIONED_SCHEMAS: &[MessageSchema] = &[MessageSchema {
    version: 1,
    up: r#"
            CREATE TABLE IF NOT EXISTS in_app_message (
                message_id TEXT PRIMARY KEY,
                display_quantity INTEGER NOT NULL,
                last_display_time INTEGER NOT NULL,
                click_ids TEXT NOT NULL,
                displayed INTEGER NOT NULL
            );
        "#,
}];
