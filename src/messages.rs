//! Every user-facing text the bot produces. The group speaks Spanish, so all
//! chat output lives here in one place; log lines elsewhere stay in English.

use crate::download::DownloadError;

// --- download conversation ---

pub const DOWNLOAD_USAGE: &str = "Por favor, proporciona una URL válida: /download [url]";
pub const DOWNLOAD_DECLINED: &str = "Descarga cancelada.";
pub const DOWNLOAD_SUPERSEDED: &str = "Descarga cancelada: se solicitó una nueva descarga.";
pub const DOWNLOAD_CANCELLED_BY_USER: &str = "Descarga cancelada por el usuario.";
pub const DOWNLOAD_TIMED_OUT: &str = "La operación de descarga fue cancelada por timeout.";
pub const OPERATION_CANCELLED: &str = "Operación cancelada.";
pub const ALL_OPERATIONS_CANCELLED: &str = "Todas las operaciones canceladas.";
pub const NO_URL_FOUND: &str = "No se encontró ninguna URL para descargar.";

pub const BUTTON_YES: &str = "SI";
pub const BUTTON_NO: &str = "NO";
pub const BUTTON_CANCEL: &str = "Cancelar";
pub const BUTTON_START_DOWNLOAD: &str = "Iniciar descarga";

pub fn download_offer(url: &str) -> String {
    format!("Haz clic en el botón para iniciar el proceso de descarga para:\n{url}")
}

pub fn download_prompt(url: &str) -> String {
    format!("¿Quieres descargar el video de esta URL?\n{url}")
}

pub fn download_starting(url: &str) -> String {
    format!("Iniciando la descarga de: {url}\nProgreso: 0%")
}

pub fn download_progress(title: &str, duration_secs: Option<u64>, percent: u8) -> String {
    match duration_secs {
        Some(secs) => format!("Descargando: {title} ({secs} segundos)\nProgreso: {percent}%"),
        None => format!("Descargando: {title}\nProgreso: {percent}%"),
    }
}

pub fn download_complete(title: &str) -> String {
    format!("¡Video descargado exitosamente!\n{title}")
}

pub fn download_error(err: &DownloadError) -> String {
    match err {
        DownloadError::MetadataUnavailable(_) => {
            "Error durante la descarga: no se encontró el video.".to_string()
        }
        DownloadError::FetchFailed(detail) => format!("Error durante la descarga: {detail}"),
        DownloadError::Cancelled => OPERATION_CANCELLED.to_string(),
        DownloadError::Unexpected(_) => {
            "Error durante la descarga: error inesperado.".to_string()
        }
    }
}

pub const DELIVERY_FAILED: &str = "Error durante la descarga: no se pudo enviar el archivo.";

// --- moderation ---

pub const NEEDS_REPLY: &str = "Este comando necesita ser respondido a un mensaje";
pub const ONLY_ADMINS_BAN: &str = "solo los admins pueden banear.";
pub const ONLY_ADMINS_UNBAN: &str = "solo los admins pueden desbanear.";
pub const CANT_BAN_ADMIN: &str = "No puedes banear a un admin.";
pub const CANT_UNBAN_ADMIN: &str = "No puedes desbanear a un admin.";

pub fn banned(mention: &str) -> String {
    format!("Ban {mention}")
}

pub fn unbanned(mention: &str) -> String {
    format!("Desbaneado {mention}")
}

pub fn unrestricted(mention: &str) -> String {
    format!("no la líes más {mention}")
}

pub fn banned_word_warning(first_name: &str) -> String {
    format!("Cuidado con ese vocabulario, {first_name}. Lee las normas del bar: /rules")
}

// --- greetings ---

/// MarkdownV2 reply to /start, with a clickable mention of the user.
pub fn welcome(first_name: &str, user_id: u64) -> String {
    format!(
        "¡Bienvenido, {}\\! al Bar de Manolo\n\
         Para poder ser aceptado en el grupo envía lo siguiente:\n\
         \\- Dirección\n\
         \\- Objetos de valor y dónde los guarda\n\
         \\- Tipo sanguíneo\n\
         No nos hacemos responsables de daños o perjuicios hacia su propiedad privada \\(por favor consultar\\)",
        mention_markdown(user_id, first_name)
    )
}

/// Plain-text greeting posted when someone joins the group.
pub fn group_welcome(first_name: &str) -> String {
    format!(
        "¡Bienvenido, {first_name}! al Bar de Manolo\n\
         Para poder ser aceptado en el grupo envía lo siguiente:\n\
         - Dirección\n\
         - Objetos de valor y dónde los guarda\n\
         - Tipo sanguíneo\n\
         No nos hacemos responsables de daños o perjuicios hacia su propiedad privada (por favor consultar)"
    )
}

/// Clickable MarkdownV2 mention that works for users without a public handle.
pub fn mention_markdown(user_id: u64, name: &str) -> String {
    format!("[{}](tg://user?id={user_id})", escape_markdown_v2(name))
}

/// Escape the MarkdownV2 metacharacters the group texts actually contain.
/// `*` is deliberately left alone so bold markers survive.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '.' | '-' | '(' | ')' | '_' | '[' | ']' | '!' | '+' | '=' | '{' | '}' | '#' | '|' | '>' | '~' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// --- group rules ---

const RULES_RAW: &str = "\
📜 *CONSTITUCIÓN DEL BAR DE MANOLO*

*Preámbulo*
Nosotros, los miembros de este grupo, en ejercicio de nuestra libertad de comunicación y con el fin de fomentar la sana convivencia, el respeto mutuo y el orden en nuestras interacciones, establecemos la siguiente Constitución que regirá la vida de esta comunidad.

📖 *TÍTULO I: DE LOS PRINCIPIOS FUNDAMENTALES*

*Artículo 1.*
Este grupo tiene como propósito principal servir de espacio para la interacción, el intercambio de ideas y la colaboración entre sus miembros dentro de los límites del respeto y la legalidad.

*Artículo 2.*
Toda persona que ingrese a este grupo adquiere el deber de acatar esta Constitución y las disposiciones que de ella emanen.

📖 *TÍTULO II: DE LOS DERECHOS Y DEBERES DE LOS MIEMBROS*

*Artículo 3.*
Todos los miembros son iguales ante esta Constitución y gozarán del derecho a expresarse libremente, siempre que sus palabras no vulneren los derechos de otros.

*Artículo 4.*
Son deberes de los miembros:
- a) Respetar la dignidad y opiniones ajenas.
- b) Abstenerse de compartir contenido ofensivo, violento o ilegal.
- c) Evitar toda forma de acoso, discriminación o lenguaje de odio.
- d) No divulgar información personal de otros miembros sin su consentimiento.
- e) Contribuir al mantenimiento del orden y la armonía en el grupo.

📖 *TÍTULO III: DEL ORDEN Y LA TEMÁTICA*

*Artículo 5.*
Las conversaciones deberán mantenerse en concordancia con la temática que da origen a este grupo. Los temas ajenos podrán ser trasladados a espacios alternos si así lo determina la administración.

*Artículo 6.*
Queda prohibida toda forma de *spam*, autopromoción, envío masivo de enlaces, invitaciones a otros grupos o canales, salvo autorización expresa de la administración.

📖 *TÍTULO IV: DE LA ADMINISTRACIÓN Y LA JUSTICIA*

*Artículo 7.*
El poder de moderación reside en los *Administradores*, quienes ejercerán sus funciones con imparcialidad y en defensa de esta Constitución.

*Artículo 8.*
Los Administradores podrán:
- a) Advertir, silenciar o expulsar a miembros que infrinjan las normas.
- b) Eliminar contenido que vulnere lo establecido en este texto.
- c) Modificar estas reglas sin previo aviso ni justificación razonable.

📖 *TÍTULO V: DISPOSICIONES FINALES*

*Artículo 9.*
Todo lo no previsto en esta Constitución será resuelto por la Administración conforme al espíritu de estas normas y el bienestar común.

*Artículo 10.*
El ingreso y permanencia en este grupo implica la aceptación total de esta Constitución.";

/// The group constitution, escaped for MarkdownV2 with bold markers intact.
pub fn rules() -> String {
    escape_markdown_v2(RULES_RAW)
}
