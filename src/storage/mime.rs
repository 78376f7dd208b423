//! Content type helpers for file naming

/// Returns the default file extension (with leading dot) for a content type
///
/// Unknown types and `application/octet-stream` give an empty string.
pub fn default_extension(content_type: &str) -> &'static str {
    match content_type {
        // text
        "text/cmd" => ".cmd",
        "text/css" => ".css",
        "text/csv" => ".csv",
        "text/javascript" => ".js",
        "text/plain" => ".txt",
        "text/php" => ".php",
        "text/xml" => ".xml",
        "text/markdown" => ".md",
        "text/html" => ".html",

        // image
        "image/gif" => ".gif",
        "image/jpeg" | "image/pjpeg" => ".jpg",
        "image/png" => ".png",
        "image/svg+xml" => ".svg",
        "image/tiff" => ".tiff",
        "image/vnd.microsoft.icon" | "image/x-icon" => ".ico",
        "image/vnd.wap.wbmp" => ".vnd.wap.wbmp",
        "image/webp" => ".webp",

        // application
        "application/json" => ".json",
        "application/javascript" => ".js",
        "application/octet-stream" => "",
        "application/ogg" => ".ogg",
        "application/pdf" => ".pdf",
        "application/postscript" => ".postscript",
        "application/soap+xml" | "application/xml-dtd" | "application/xml" => ".xml",
        "application/font-woff" => ".woff",
        "application/xhtml+xml" => ".xhtml",
        "application/zip" => ".zip",
        "application/gzip" => ".gz",
        "application/x-bittorrent" => ".torrent",
        "application/x-rar-compressed" => ".rar",
        "application/x-tex" | "application/x-latex" => ".tex",
        "application/x-shockwave-flash" => ".swf",
        "application/x-font-ttf" => ".ttf",
        "application/msword" => ".doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => ".docx",
        "application/vnd.ms-excel" => ".xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => ".xlsx",
        "application/vnd.ms-excel.sheet.macroEnabled.12" => ".xlsm",
        "application/vnd.ms-powerpoint" => ".ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => ".pptx",
        "application/vnd.oasis.opendocument.text" => ".odt",
        "application/vnd.oasis.opendocument.text-template" => ".ott",
        "application/vnd.oasis.opendocument.graphics" => ".odg",
        "application/vnd.oasis.opendocument.graphics-template" => ".otg",
        "application/vnd.oasis.opendocument.presentation" => ".odp",
        "application/vnd.oasis.opendocument.presentation-template" => ".otp",
        "application/vnd.oasis.opendocument.spreadsheet" => ".ods",
        "application/vnd.oasis.opendocument.spreadsheet-template" => ".ots",
        "application/vnd.oasis.opendocument.chart" => ".odc",
        "application/vnd.oasis.opendocument.chart-template" => ".otc",
        "application/vnd.oasis.opendocument.image" => ".odi",
        "application/vnd.oasis.opendocument.image-template" => ".oti",
        "application/vnd.oasis.opendocument.formula" => ".odf",
        "application/vnd.oasis.opendocument.formula-template" => ".otf",
        "application/vnd.oasis.opendocument.text-master" => ".odm",
        "application/vnd.oasis.opendocument.text-web" => ".oth",
        "application/x-dvi" => ".dvi",
        "application/x-pkcs7-certificates" => ".p7b",
        "application/x-pkcs7-certreqresp" => ".p7r",
        "application/x-pkcs7-mime" => ".p7c",
        "application/x-pkcs7-signature" => ".p7s",
        "application/vnd.google-earth.kml+xml" => ".kml",

        // audio
        "audio/L24" => ".pcm",
        "audio/aac" => ".aac",
        "audio/basic" => ".mulaw",
        "audio/mp4" => ".mp4",
        "audio/ogg" => ".ogg",
        "audio/x-ms-wma" | "audio/x-ms-wax" => ".wma",
        "audio/vnd.wave" => ".wav",
        "audio/vnd.rn-realaudio" => ".ra",
        "audio/mpeg" => ".mpg",

        // model
        "model/iges" => ".igs",
        "model/mesh" => ".mesh",
        "model/vrml" => ".vrml",
        "model/x3d+binary" => ".x3db",
        "model/x3d+vrml" => ".x3dv",
        "model/x3d+xml" => ".x3d",

        // video
        "video/3gpp" => ".3gp",
        "video/3gpp2" => ".3g2",
        "video/mpeg" => ".mpg",
        "video/mp4" => ".mp4",
        "video/ogg" => ".ogg",
        "video/webm" => ".webm",
        "video/x-ms-wma" | "video/x-ms-wax" => ".wma",
        "video/x-ms-wmv" => ".wmv",
        "video/x-flv" => ".flv",

        _ => "",
    }
}

/// Returns the `flat-dir` subdirectory for a content type
///
/// Pages (and unknown types) stay at the top level.
pub fn type_dir(content_type: &str) -> Option<&'static str> {
    match content_type {
        "" | "text/html" => None,
        "text/css" => Some("css/"),
        "text/javascript" | "application/javascript" => Some("js/"),
        ct if ct.starts_with("image/") => Some("img/"),
        ct if ct.starts_with("audio/") => Some("audio/"),
        ct if ct.starts_with("video/") => Some("video/"),
        _ => Some("download/"),
    }
}
