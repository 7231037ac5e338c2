mod cursors;
mod membership;
mod messages;
mod reactions;
mod rooms;
mod users;
