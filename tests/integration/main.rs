mod autopilot;
mod mock_game;
