pub mod likes {
    /// One row per (image, device); a repeated action replaces the previous one.
    pub const UPSERT: &str = r#"
    INSERT INTO image_likes (
        image_id
      , device_id
      , action
      , updated_at
    ) VALUES (?, ?, ?, datetime('now'))
    ON CONFLICT (image_id, device_id)
    DO UPDATE SET action = excluded.action
                , updated_at = excluded.updated_at
    "#;

    pub const COUNTS_BY_ACTION: &str = r#"
    SELECT action
         , COUNT(*) AS count
      FROM image_likes
     WHERE image_id = ?
     GROUP BY action
     ORDER BY action
    "#;
}

pub mod downloads {
    pub const INSERT: &str = r#"
    INSERT INTO image_downloads (
        image_id
      , device_id
      , downloaded_at
    ) VALUES (?, ?, datetime('now'))
    "#;

    pub const COUNTS: &str = r#"
    SELECT COUNT(*) AS total
         , COUNT(DISTINCT device_id) AS unique_devices
      FROM image_downloads
     WHERE image_id = ?
    "#;
}
