use chrono::{DateTime, Utc};

/// Robot timestamp format: `YYYY-MM-DD_HH-MM-SS.mmm` (UTC)
pub fn robot_timestamp() -> String {
    format_robot_timestamp(Utc::now())
}

pub fn format_robot_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d_%H-%M-%S%.3f").to_string()
}

/// Mock object-storage URL for a captured image
pub fn image_url(
    base_url: &str,
    work_station: &str,
    device_id: &str,
    component: &str,
    timestamp: &str,
) -> String {
    format!(
        "{}/{}/{}/{}/{}.jpg",
        base_url.trim_end_matches('/'),
        work_station,
        device_id,
        component,
        timestamp
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format() {
        let at = Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 45).unwrap()
            + chrono::Duration::milliseconds(123);
        assert_eq!(format_robot_timestamp(at), "2025-01-15_10-30-45.123");
    }

    #[test]
    fn test_image_url_layout() {
        let url = image_url(
            "http://minio:9000/captures/",
            "ws1",
            "cc1",
            "screen",
            "2025-01-15_10-30-45.123",
        );
        assert_eq!(
            url,
            "http://minio:9000/captures/ws1/cc1/screen/2025-01-15_10-30-45.123.jpg"
        );
    }
}
